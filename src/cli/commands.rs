use std::time::Duration;

use serialport::SerialPortType;
use tokio::time::sleep;

use crate::cli::args::{Args, Command, ConfigCommand, DataFormat, DeviceAction};
use crate::cli::output::{ConsoleWriter, OutputWriter, PortEntry};
use crate::core::session::DeviceSession;
use crate::domain::config::{BoardlinkConfig, ConnectOptions};
use crate::domain::error::{DeviceError, DeviceResult};
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::{logging, storage};

/// Execute CLI command
pub async fn execute_command(args: Args) -> DeviceResult<()> {
    let writer = ConsoleWriter::new(args.output.clone());

    let config_manager = ConfigManager::new()?;
    let config = if let Some(config_path) = &args.config {
        ConfigManager::load_config_from_path(config_path)?
    } else {
        config_manager.load_config()?
    };

    let level = logging::resolve_level(args.verbose, args.quiet, &config.global.log_level);
    logging::init_logging(&level)?;

    match args.command {
        Command::Serial(serial_args) => {
            let options = ConnectOptions::Serial((&serial_args).into());
            run_device_action(options, serial_args.action, &writer, &config).await
        }
        Command::Usb(usb_args) => {
            let options = ConnectOptions::Usb((&usb_args).into());
            run_device_action(options, usb_args.action, &writer, &config).await
        }
        Command::Device(device_args) => {
            let profile = config
                .devices
                .iter()
                .find(|profile| profile.name == device_args.name)
                .ok_or_else(|| DeviceError::Config {
                    message: format!("no device profile named '{}'", device_args.name),
                })?;
            run_device_action(profile.connect.clone(), device_args.action, &writer, &config).await
        }
        Command::Ports => list_ports(&writer),
        Command::Copy(copy_args) => {
            let bytes = storage::copy_into_dir(&copy_args.image, &copy_args.dest).await?;
            writer.write_message(&format!(
                "Copied {} bytes to {}",
                bytes,
                copy_args.dest.display()
            ))?;
            Ok(())
        }
        Command::Config(config_args) => {
            execute_config_command(config_args.command, &writer, &config, &config_manager)
        }
    }
}

/// Connect, run one action, then tear the session down. Action errors win
/// over disconnect errors.
async fn run_device_action(
    options: ConnectOptions,
    action: DeviceAction,
    writer: &ConsoleWriter,
    config: &BoardlinkConfig,
) -> DeviceResult<()> {
    let session = DeviceSession::with_capacity(config.global.log_capacity);
    let summary = session.connect(&options).await?;

    let result = match action {
        DeviceAction::Send {
            data,
            format,
            raw,
            wait_ms,
        } => send_action(&session, &data, format, raw, wait_ms, writer).await,
        DeviceAction::FsMode => report(
            session.trigger_fs_mode().await,
            "Bootloader requested; wait for the board to mount as a drive",
            writer,
        ),
        DeviceAction::ReplMode => report(
            session.trigger_repl_mode().await,
            "Interrupt sent; the board should be at the REPL prompt",
            writer,
        ),
        DeviceAction::Reboot => report(session.reboot().await, "Reset requested", writer),
        DeviceAction::Upload { file } => report(
            session.upload_file(&file).await,
            &format!("Uploaded {}", file.display()),
            writer,
        ),
        DeviceAction::Monitor { duration } => {
            writer.write_message(&format!("Monitoring {} (press Ctrl+C to stop)", summary))?;
            monitor_action(&session, duration, writer).await
        }
    };

    let disconnect_result = session.disconnect().await;
    result.and(disconnect_result)
}

fn report(result: DeviceResult<()>, message: &str, writer: &ConsoleWriter) -> DeviceResult<()> {
    result?;
    writer.write_message(message)?;
    Ok(())
}

/// Send one payload, wait briefly for the board to answer, then print the
/// lines that arrived since the send.
async fn send_action(
    session: &DeviceSession,
    data: &str,
    format: DataFormat,
    raw: bool,
    wait_ms: u64,
    writer: &ConsoleWriter,
) -> DeviceResult<()> {
    let bytes = parse_data(data, format)?;
    let before = session.snapshot().await.lines_total;

    if raw {
        session.send_raw(&bytes).await?;
    } else {
        let command = String::from_utf8(bytes).map_err(|e| {
            DeviceError::InvalidInput(format!("command is not valid UTF-8: {}", e))
        })?;
        session.send_command(&command).await?;
    }

    sleep(Duration::from_millis(wait_ms)).await;
    let snapshot = session.snapshot().await;
    let new_lines = snapshot.lines_total.saturating_sub(before) as usize;
    if new_lines > 0 {
        let start = snapshot.logs.len().saturating_sub(new_lines);
        writer.write_lines(&snapshot.logs[start..])?;
    }
    Ok(())
}

/// Stream device output as it arrives, until Ctrl+C, the optional duration,
/// or a connection loss.
async fn monitor_action(
    session: &DeviceSession,
    duration: Option<u64>,
    writer: &ConsoleWriter,
) -> DeviceResult<()> {
    let mut updates = session.subscribe();
    let mut printed = updates.borrow_and_update().lines_total;

    let deadline = async {
        match duration {
            Some(secs) => sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            _ = &mut interrupt => break,
            _ = &mut deadline => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                let new_lines = snapshot.lines_total.saturating_sub(printed) as usize;
                if new_lines > 0 {
                    let start = snapshot.logs.len().saturating_sub(new_lines);
                    writer.write_lines(&snapshot.logs[start..])?;
                    printed = snapshot.lines_total;
                }
                if !snapshot.is_connected {
                    if let Some(last_error) = snapshot.last_error {
                        return Err(DeviceError::from(last_error));
                    }
                    break;
                }
            }
        }
    }
    Ok(())
}

fn list_ports(writer: &ConsoleWriter) -> DeviceResult<()> {
    let ports = serialport::available_ports().map_err(|e| DeviceError::Connect {
        message: format!("failed to list serial ports: {}", e),
    })?;
    let entries: Vec<PortEntry> = ports.iter().map(port_entry).collect();
    writer.write_ports(&entries)?;
    Ok(())
}

fn port_entry(info: &serialport::SerialPortInfo) -> PortEntry {
    let (kind, details) = match &info.port_type {
        SerialPortType::UsbPort(usb) => (
            "usb".to_string(),
            usb_details(usb.vid, usb.pid, usb.product.as_deref()),
        ),
        SerialPortType::BluetoothPort => ("bluetooth".to_string(), String::new()),
        SerialPortType::PciPort => ("pci".to_string(), String::new()),
        SerialPortType::Unknown => ("unknown".to_string(), String::new()),
    };
    PortEntry {
        name: info.port_name.clone(),
        kind,
        details,
    }
}

fn usb_details(vid: u16, pid: u16, product: Option<&str>) -> String {
    let mut details = format!("{:04x}:{:04x}", vid, pid);
    if let Some(product) = product {
        details.push(' ');
        details.push_str(product);
    }
    details
}

fn execute_config_command(
    command: ConfigCommand,
    writer: &ConsoleWriter,
    config: &BoardlinkConfig,
    config_manager: &ConfigManager,
) -> DeviceResult<()> {
    match command {
        ConfigCommand::Show => {
            writer.write_config(config)?;
            Ok(())
        }
        ConfigCommand::Init { dir } => {
            let dir = match dir {
                Some(dir) => dir,
                None => std::env::current_dir().map_err(|e| DeviceError::Config {
                    message: format!("failed to get current directory: {}", e),
                })?,
            };
            let created = config_manager.init_project_config(&dir)?;
            writer.write_message(&format!(
                "Project configuration created at {}",
                created.display()
            ))?;
            Ok(())
        }
        ConfigCommand::Path => {
            writer.write_message(&format!(
                "Global: {}",
                config_manager.global_config_path().display()
            ))?;
            match config_manager.project_config_path() {
                Some(path) => {
                    writer.write_message(&format!("Project: {}", path.display()))?;
                }
                None => {
                    writer.write_message("Project: (none found)")?;
                }
            }
            Ok(())
        }
        ConfigCommand::Devices => {
            writer.write_devices(&config.devices)?;
            Ok(())
        }
    }
}

fn parse_data(data: &str, format: DataFormat) -> DeviceResult<Vec<u8>> {
    match format {
        DataFormat::Text => Ok(data.as_bytes().to_vec()),
        DataFormat::Hex => {
            let cleaned = data.replace(' ', "").replace('\n', "");
            hex::decode(&cleaned)
                .map_err(|e| DeviceError::InvalidInput(format!("invalid hex data: {}", e)))
        }
        DataFormat::Base64 => {
            use base64::Engine;
            base64::engine::general_purpose::STANDARD
                .decode(data)
                .map_err(|e| DeviceError::InvalidInput(format!("invalid base64 data: {}", e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_text() {
        let bytes = parse_data("print(1)", DataFormat::Text).unwrap();
        assert_eq!(bytes, b"print(1)");
    }

    #[test]
    fn test_parse_data_hex_ignores_whitespace() {
        let bytes = parse_data("03 0d\n0a", DataFormat::Hex).unwrap();
        assert_eq!(bytes, vec![0x03, 0x0d, 0x0a]);
    }

    #[test]
    fn test_parse_data_hex_rejects_garbage() {
        let result = parse_data("zz", DataFormat::Hex);
        assert!(matches!(result, Err(DeviceError::InvalidInput(_))));
    }

    #[test]
    fn test_parse_data_base64() {
        let bytes = parse_data("aGVsbG8=", DataFormat::Base64).unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_usb_details_includes_product() {
        assert_eq!(
            usb_details(0x2e8a, 0x0005, Some("Board in FS mode")),
            "2e8a:0005 Board in FS mode"
        );
        assert_eq!(usb_details(0x2e8a, 0x0005, None), "2e8a:0005");
    }
}
