fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Point prost/tonic at a bundled protoc binary so the build does not
    // depend on a system-wide protobuf-compiler installation.
    if std::env::var_os("PROTOC").is_none() {
        if let Ok(protoc) = protoc_bin_vendored::protoc_bin_path() {
            std::env::set_var("PROTOC", protoc);
        }
    }

    // Compile the speech recognition service proto files
    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .compile(&["proto/speech.proto"], &["proto"])?;

    Ok(())
}
