// Build script to compile Protocol Buffer definitions.
//
// `protox` parses the schema into a descriptor set, so tonic-build can skip
// its own `protoc` run.

use prost::Message;
use std::path::PathBuf;

const PROTOS: [&str; 3] = [
    "../../proto/ion.proto",
    "../../proto/biz.proto",
    "../../proto/islb.proto",
];
const INCLUDES: [&str; 1] = ["../../proto/"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let descriptors = protox::compile(PROTOS, INCLUDES)?;
    let descriptor_path = PathBuf::from(std::env::var("OUT_DIR")?).join("ion_descriptor.bin");
    std::fs::write(&descriptor_path, descriptors.encode_to_vec())?;

    tonic_build::configure()
        .file_descriptor_set_path(&descriptor_path)
        .skip_protoc_run()
        .compile_protos(&PROTOS, &INCLUDES)?;

    for proto in PROTOS {
        println!("cargo:rerun-if-changed={proto}");
    }

    Ok(())
}
