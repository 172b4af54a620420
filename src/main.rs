//! StickVoiceMemo entry point
//!
//! - ESP-IDF: device firmware (codec, I2S, buttons, control loop)
//! - Host: scripted simulator over `hal::sim`, frames printed via the logger

#[cfg(target_os = "espidf")]
mod device;

#[cfg(not(target_os = "espidf"))]
mod cli;

#[cfg(target_os = "espidf")]
fn main() {
    if let Err(e) = device::run() {
        log::error!("voicememo stopped: {}", e);
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() -> std::process::ExitCode {
    use clap::Parser;

    let args = cli::Args::parse();
    cli::init_logging(&args);

    match cli::run(&args) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            std::process::ExitCode::FAILURE
        }
    }
}
