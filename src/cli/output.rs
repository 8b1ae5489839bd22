use std::io::{self, Write};

use serde::Serialize;
use tabled::{Table, Tabled};

use crate::cli::args::OutputFormat;
use crate::domain::config::{BoardlinkConfig, ConnectOptions, DeviceProfile};

/// Output writer trait for different formats
pub trait OutputWriter {
    fn write_ports(&self, ports: &[PortEntry]) -> Result<(), OutputError>;
    fn write_devices(&self, devices: &[DeviceProfile]) -> Result<(), OutputError>;
    fn write_config(&self, config: &BoardlinkConfig) -> Result<(), OutputError>;
    fn write_lines(&self, lines: &[String]) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
    fn write_error(&self, error: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<OutputError> for crate::domain::error::DeviceError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// One discovered serial port, ready for display.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct PortEntry {
    pub name: String,
    pub kind: String,
    pub details: String,
}

/// Console output writer
pub struct ConsoleWriter {
    format: OutputFormat,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl OutputWriter for ConsoleWriter {
    fn write_ports(&self, ports: &[PortEntry]) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                if ports.is_empty() {
                    println!("No serial ports found");
                }
                for port in ports {
                    if port.details.is_empty() {
                        println!("{} ({})", port.name, port.kind);
                    } else {
                        println!("{} ({}) {}", port.name, port.kind, port.details);
                    }
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(ports)?);
            }
            OutputFormat::Table => {
                if !ports.is_empty() {
                    println!("{}", Table::new(ports));
                }
            }
            OutputFormat::Csv => {
                println!("name,kind,details");
                for port in ports {
                    println!(
                        "{},{},{}",
                        csv_field(&port.name),
                        csv_field(&port.kind),
                        csv_field(&port.details)
                    );
                }
            }
        }
        Ok(())
    }

    fn write_devices(&self, devices: &[DeviceProfile]) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                if devices.is_empty() {
                    println!("No device profiles configured");
                }
                for device in devices {
                    println!("Device: {}", device.name);
                    if !device.description.is_empty() {
                        println!("  Description: {}", device.description);
                    }
                    println!("  Connect: {}", connect_label(&device.connect));
                    println!();
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(devices)?);
            }
            OutputFormat::Table => {
                if !devices.is_empty() {
                    let rows: Vec<DeviceRow> = devices.iter().map(DeviceRow::from).collect();
                    println!("{}", Table::new(rows));
                }
            }
            OutputFormat::Csv => {
                println!("name,connect,description");
                for device in devices {
                    println!(
                        "{},{},{}",
                        csv_field(&device.name),
                        csv_field(&connect_label(&device.connect)),
                        csv_field(&device.description)
                    );
                }
            }
        }
        Ok(())
    }

    fn write_config(&self, config: &BoardlinkConfig) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(config)?);
            }
            OutputFormat::Table | OutputFormat::Csv => {
                self.write_devices(&config.devices)?;
            }
            OutputFormat::Text => {
                println!("Boardlink configuration:");
                println!("  Log level: {}", config.global.log_level);
                println!("  Log capacity: {} lines", config.global.log_capacity);
                if !config.devices.is_empty() {
                    println!("  Devices:");
                    for device in &config.devices {
                        println!("    {}: {}", device.name, connect_label(&device.connect));
                    }
                }
            }
        }
        Ok(())
    }

    fn write_lines(&self, lines: &[String]) -> Result<(), OutputError> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        match self.format {
            OutputFormat::Json => {
                writeln!(out, "{}", serde_json::to_string_pretty(lines)?)?;
            }
            OutputFormat::Csv => {
                for line in lines {
                    writeln!(out, "{}", csv_field(line))?;
                }
            }
            _ => {
                for line in lines {
                    writeln!(out, "{}", line)?;
                }
            }
        }
        Ok(())
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "message": message,
                    "level": "info"
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            _ => {
                println!("{}", message);
            }
        }
        Ok(())
    }

    fn write_error(&self, error: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "error": error,
                    "level": "error"
                });
                eprintln!("{}", serde_json::to_string_pretty(&output)?);
            }
            _ => {
                eprintln!("Error: {}", error);
            }
        }
        Ok(())
    }
}

/// Table row for a device profile
#[derive(Tabled)]
struct DeviceRow {
    name: String,
    connect: String,
    description: String,
}

impl From<&DeviceProfile> for DeviceRow {
    fn from(device: &DeviceProfile) -> Self {
        Self {
            name: device.name.clone(),
            connect: connect_label(&device.connect),
            description: device.description.clone(),
        }
    }
}

fn connect_label(connect: &ConnectOptions) -> String {
    match connect {
        ConnectOptions::Serial(options) => {
            format!("serial {} @ {}", options.port, options.baud_rate)
        }
        ConnectOptions::Usb(options) => match (options.vendor_id, options.product_id) {
            (Some(vid), Some(pid)) => format!("usb {:04x}:{:04x}", vid, pid),
            (Some(vid), None) => format!("usb {:04x}:*", vid),
            _ => "usb (first match)".to_string(),
        },
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
