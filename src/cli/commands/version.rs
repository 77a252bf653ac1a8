//! Version command implementation

use crate::cli::Output;
use anyhow::Result;

pub async fn execute(output: &Output) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let name = env!("CARGO_PKG_NAME");

    if output.is_quiet() {
        println!("{} {}", name, version);
        return Ok(());
    }

    output.header(&format!("{} v{}", name, version));
    output.key_value("Description:", env!("CARGO_PKG_DESCRIPTION"), false);
    output.key_value("License:", env!("CARGO_PKG_LICENSE"), false);

    output.category("Build Information");
    output.key_value("Target:", std::env::consts::ARCH, false);
    output.key_value(
        "Profile:",
        if cfg!(debug_assertions) { "debug" } else { "release" },
        false,
    );
    output.key_value("Default workers:", &(num_cpus::get().saturating_sub(1).max(1)).to_string(), true);
    output.blank_line();

    Ok(())
}
