// Code generation for gRPC protobuf definitions

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let file_descriptor_set = protox::compile(["proto/pulse.proto"], ["proto"])?;
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_fds(file_descriptor_set)?;
    Ok(())
}
