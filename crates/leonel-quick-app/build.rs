use std::path::Path;

fn main() {
    let version_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../VERSION");
    println!("cargo:rerun-if-changed={}", version_path.display());

    let raw = std::fs::read_to_string(&version_path)
        .unwrap_or_else(|error| panic!("cannot read {}: {error}", version_path.display()));
    let version = raw.trim();

    let well_formed = version.split('.').count() == 3
        && version
            .split('.')
            .all(|part| !part.is_empty() && part.bytes().all(|byte| byte.is_ascii_digit()));
    assert!(
        well_formed,
        "VERSION must be MAJOR.MINOR.PATCH, got {version:?}"
    );

    println!("cargo:rustc-env=LEONEL_QUICK_VERSION={version}");
}
