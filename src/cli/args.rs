use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::domain::config::{
    FlowControlOption, ParityOption, SerialOptions, UsbOptions,
};

/// Command line arguments for boardlink
#[derive(Parser, Debug)]
#[command(
    name = "boardlink",
    version = env!("CARGO_PKG_VERSION"),
    about = "Session tool for microcontroller boards over serial and USB",
    long_about = "Drives a MicroPython-style board through its REPL: send commands, reboot, drop into the bootloader for UF2 flashing, upload scripts and monitor output, over a serial port or a raw USB bulk interface."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Talk to a board over a serial port
    Serial(SerialArgs),
    /// Talk to a board over a raw USB bulk interface
    Usb(UsbArgs),
    /// Talk to a board using a configured device profile
    Device(DeviceArgs),
    /// List available serial ports
    Ports,
    /// Copy a UF2 image onto a mounted bootloader drive
    Copy(CopyArgs),
    /// Configuration management commands
    Config(ConfigArgs),
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// Table output
    Table,
    /// CSV output
    Csv,
}

/// Serial connection arguments
#[derive(ClapArgs, Debug)]
pub struct SerialArgs {
    /// Serial port path
    #[arg(short, long)]
    pub port: String,

    /// Baud rate
    #[arg(short, long, default_value = "115200")]
    pub baud: u32,

    /// Data bits
    #[arg(long, default_value = "8")]
    pub data_bits: u8,

    /// Stop bits
    #[arg(long, default_value = "1")]
    pub stop_bits: u8,

    /// Parity (none, even, odd)
    #[arg(long, value_enum, default_value = "none")]
    pub parity: ParityArg,

    /// Flow control (none, software, hardware)
    #[arg(long, value_enum, default_value = "none")]
    pub flow_control: FlowControlArg,

    /// Action to run against the board
    #[command(subcommand)]
    pub action: DeviceAction,
}

/// USB connection arguments
#[derive(ClapArgs, Debug)]
pub struct UsbArgs {
    /// Vendor id (hex, e.g. 2e8a)
    #[arg(long, value_parser = parse_hex_u16)]
    pub vid: Option<u16>,

    /// Product id (hex, e.g. 0005)
    #[arg(long, value_parser = parse_hex_u16)]
    pub pid: Option<u16>,

    /// Interface number to claim instead of scanning
    #[arg(long)]
    pub interface: Option<u8>,

    /// Bulk IN endpoint address (hex, e.g. 81)
    #[arg(long, value_parser = parse_hex_u8)]
    pub endpoint_in: Option<u8>,

    /// Bulk OUT endpoint address (hex, e.g. 02)
    #[arg(long, value_parser = parse_hex_u8)]
    pub endpoint_out: Option<u8>,

    /// Bulk transfer size in bytes
    #[arg(long, default_value = "64")]
    pub packet_size: usize,

    /// Action to run against the board
    #[command(subcommand)]
    pub action: DeviceAction,
}

/// Configured device profile arguments
#[derive(ClapArgs, Debug)]
pub struct DeviceArgs {
    /// Profile name from the configuration
    pub name: String,

    /// Action to run against the board
    #[command(subcommand)]
    pub action: DeviceAction,
}

/// UF2 copy arguments
#[derive(ClapArgs, Debug)]
pub struct CopyArgs {
    /// UF2 image to copy
    pub image: PathBuf,

    /// Mounted bootloader drive to copy into
    pub dest: PathBuf,
}

/// Configuration management arguments
#[derive(ClapArgs, Debug)]
pub struct ConfigArgs {
    /// Configuration subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Actions shared by the serial, usb and device commands
#[derive(Subcommand, Debug)]
pub enum DeviceAction {
    /// Send a command line to the REPL and print the response
    Send {
        /// Data to send
        data: String,
        /// Data format (text, hex, base64)
        #[arg(short, long, value_enum, default_value = "text")]
        format: DataFormat,
        /// Send the bytes as-is, without a trailing carriage return
        #[arg(short, long)]
        raw: bool,
        /// How long to collect output before printing, in milliseconds
        #[arg(short, long, default_value = "200")]
        wait_ms: u64,
    },
    /// Reboot into the UF2 bootloader so the board mounts as a drive
    FsMode,
    /// Interrupt the running program and return to the REPL prompt
    ReplMode,
    /// Restart the firmware
    Reboot,
    /// Paste a script into the REPL
    Upload {
        /// Path to the script
        file: PathBuf,
    },
    /// Stream device output until interrupted
    Monitor {
        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,
    },
}

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the merged configuration
    Show,
    /// Create a project configuration with example profiles
    Init {
        /// Directory to create .boardlink in (defaults to the current directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
    /// Show which configuration files are in use
    Path,
    /// List configured device profiles
    Devices,
}

/// Parity configuration argument
#[derive(ValueEnum, Debug, Clone)]
pub enum ParityArg {
    None,
    Even,
    Odd,
}

/// Flow control configuration argument
#[derive(ValueEnum, Debug, Clone)]
pub enum FlowControlArg {
    None,
    Software,
    Hardware,
}

/// Data format argument
#[derive(ValueEnum, Debug, Clone)]
pub enum DataFormat {
    Text,
    Hex,
    Base64,
}

fn parse_hex_u16(value: &str) -> Result<u16, String> {
    let digits = value.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid hex value '{}': {}", value, e))
}

fn parse_hex_u8(value: &str) -> Result<u8, String> {
    let digits = value.trim_start_matches("0x").trim_start_matches("0X");
    u8::from_str_radix(digits, 16).map_err(|e| format!("invalid hex value '{}': {}", value, e))
}

impl From<ParityArg> for ParityOption {
    fn from(parity: ParityArg) -> Self {
        match parity {
            ParityArg::None => Self::None,
            ParityArg::Even => Self::Even,
            ParityArg::Odd => Self::Odd,
        }
    }
}

impl From<FlowControlArg> for FlowControlOption {
    fn from(flow_control: FlowControlArg) -> Self {
        match flow_control {
            FlowControlArg::None => Self::None,
            FlowControlArg::Software => Self::Software,
            FlowControlArg::Hardware => Self::Hardware,
        }
    }
}

impl From<&SerialArgs> for SerialOptions {
    fn from(args: &SerialArgs) -> Self {
        Self {
            port: args.port.clone(),
            baud_rate: args.baud,
            data_bits: args.data_bits,
            stop_bits: args.stop_bits,
            parity: args.parity.clone().into(),
            flow_control: args.flow_control.clone().into(),
        }
    }
}

impl From<&UsbArgs> for UsbOptions {
    fn from(args: &UsbArgs) -> Self {
        Self {
            vendor_id: args.vid,
            product_id: args.pid,
            interface: args.interface,
            endpoint_in: args.endpoint_in,
            endpoint_out: args.endpoint_out,
            packet_size: args.packet_size,
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Text
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataFormat::Text => write!(f, "text"),
            DataFormat::Hex => write!(f, "hex"),
            DataFormat::Base64 => write!(f, "base64"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serial_send() {
        let args = Args::try_parse_from([
            "boardlink", "serial", "--port", "/dev/ttyACM0", "send", "print(1)",
        ])
        .unwrap();

        match args.command {
            Command::Serial(serial) => {
                assert_eq!(serial.port, "/dev/ttyACM0");
                assert_eq!(serial.baud, 115200);
                match serial.action {
                    DeviceAction::Send { data, raw, wait_ms, .. } => {
                        assert_eq!(data, "print(1)");
                        assert!(!raw);
                        assert_eq!(wait_ms, 200);
                    }
                    other => panic!("unexpected action: {:?}", other),
                }
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_usb_hex_ids() {
        let args = Args::try_parse_from([
            "boardlink", "usb", "--vid", "2e8a", "--pid", "0x0005", "fs-mode",
        ])
        .unwrap();

        match args.command {
            Command::Usb(usb) => {
                assert_eq!(usb.vid, Some(0x2e8a));
                assert_eq!(usb.pid, Some(0x0005));
                assert!(matches!(usb.action, DeviceAction::FsMode));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_bad_hex() {
        let result =
            Args::try_parse_from(["boardlink", "usb", "--vid", "zzzz", "repl-mode"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_device_monitor_duration() {
        let args = Args::try_parse_from([
            "boardlink", "device", "pico", "monitor", "--duration", "5",
        ])
        .unwrap();

        match args.command {
            Command::Device(device) => {
                assert_eq!(device.name, "pico");
                assert!(matches!(
                    device.action,
                    DeviceAction::Monitor { duration: Some(5) }
                ));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "boardlink", "serial", "--port", "/dev/ttyUSB0", "--verbose", "repl-mode",
        ])
        .unwrap();
        assert!(args.verbose);
    }

    #[test]
    fn test_serial_args_convert_to_options() {
        let args = Args::try_parse_from([
            "boardlink", "serial", "--port", "/dev/ttyACM1", "--baud", "9600",
            "--parity", "even", "reboot",
        ])
        .unwrap();

        if let Command::Serial(serial) = &args.command {
            let options = SerialOptions::from(serial);
            assert_eq!(options.port, "/dev/ttyACM1");
            assert_eq!(options.baud_rate, 9600);
            assert_eq!(options.parity, ParityOption::Even);
        } else {
            panic!("unexpected command: {:?}", args.command);
        }
    }

    #[test]
    fn test_parse_copy_paths() {
        let args = Args::try_parse_from([
            "boardlink", "copy", "firmware.uf2", "/media/RPI-RP2",
        ])
        .unwrap();

        match args.command {
            Command::Copy(copy) => {
                assert_eq!(copy.image, PathBuf::from("firmware.uf2"));
                assert_eq!(copy.dest, PathBuf::from("/media/RPI-RP2"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
