use serde::{Deserialize, Serialize};

/// Boardlink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardlinkConfig {
    /// Global configuration
    pub global: GlobalConfig,
    /// Named device profiles
    #[serde(default)]
    pub devices: Vec<DeviceProfile>,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Device log buffer capacity in lines
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

/// A named way to reach a board
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Profile name
    pub name: String,
    /// Profile description
    #[serde(default)]
    pub description: String,
    /// How to open the transport
    pub connect: ConnectOptions,
}

/// Transport selection and settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConnectOptions {
    #[serde(rename = "serial")]
    Serial(SerialOptions),
    #[serde(rename = "usb")]
    Usb(UsbOptions),
}

/// Serial port settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialOptions {
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default = "default_parity")]
    pub parity: ParityOption,
    #[serde(default = "default_flow_control")]
    pub flow_control: FlowControlOption,
}

/// USB device selection and endpoint settings
///
/// Leaving the interface/endpoint fields unset lets the backend scan the
/// device's active configuration for the first bulk IN/OUT pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsbOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_in: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_out: Option<u8>,
    #[serde(default = "default_packet_size")]
    pub packet_size: usize,
}

/// Parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParityOption {
    None,
    Odd,
    Even,
}

/// Flow control setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControlOption {
    None,
    Hardware,
    Software,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_capacity() -> usize {
    200
}

fn default_baud_rate() -> u32 {
    115200
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_parity() -> ParityOption {
    ParityOption::None
}

fn default_flow_control() -> FlowControlOption {
    FlowControlOption::None
}

fn default_packet_size() -> usize {
    64
}

impl Default for BoardlinkConfig {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            devices: Vec::new(),
        }
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_capacity: default_log_capacity(),
        }
    }
}

impl Default for ParityOption {
    fn default() -> Self {
        default_parity()
    }
}

impl Default for FlowControlOption {
    fn default() -> Self {
        default_flow_control()
    }
}

impl SerialOptions {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: default_parity(),
            flow_control: default_flow_control(),
        }
    }
}

impl Default for UsbOptions {
    fn default() -> Self {
        Self {
            vendor_id: None,
            product_id: None,
            interface: None,
            endpoint_in: None,
            endpoint_out: None,
            packet_size: default_packet_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = BoardlinkConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let _deserialized: BoardlinkConfig = toml::from_str(&toml_str).unwrap();
    }

    #[test]
    fn test_serial_profile() {
        let config = BoardlinkConfig {
            global: GlobalConfig::default(),
            devices: vec![DeviceProfile {
                name: "pico".to_string(),
                description: "Raspberry Pi Pico on the bench".to_string(),
                connect: ConnectOptions::Serial(SerialOptions::new("/dev/ttyACM0")),
            }],
        };

        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: BoardlinkConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.devices.len(), 1);
        match &deserialized.devices[0].connect {
            ConnectOptions::Serial(options) => {
                assert_eq!(options.port, "/dev/ttyACM0");
                assert_eq!(options.baud_rate, 115200);
            }
            other => panic!("expected serial options, got {:?}", other),
        }
    }

    #[test]
    fn test_usb_profile() {
        let toml_str = r#"
            [global]

            [[devices]]
            name = "pico-usb"

            [devices.connect]
            type = "usb"
            vendor_id = 0x2e8a
            product_id = 0x0005
        "#;

        let config: BoardlinkConfig = toml::from_str(toml_str).unwrap();
        match &config.devices[0].connect {
            ConnectOptions::Usb(options) => {
                assert_eq!(options.vendor_id, Some(0x2e8a));
                assert_eq!(options.product_id, Some(0x0005));
                assert_eq!(options.interface, None);
                assert_eq!(options.packet_size, 64);
            }
            other => panic!("expected usb options, got {:?}", other),
        }
    }

    #[test]
    fn test_serial_defaults_fill_in() {
        let toml_str = r#"
            [global]
            log_capacity = 50

            [[devices]]
            name = "bare"

            [devices.connect]
            type = "serial"
            port = "/dev/ttyUSB1"
        "#;

        let config: BoardlinkConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.global.log_capacity, 50);
        assert_eq!(config.global.log_level, "info");
        match &config.devices[0].connect {
            ConnectOptions::Serial(options) => {
                assert_eq!(options.data_bits, 8);
                assert_eq!(options.stop_bits, 1);
                assert_eq!(options.parity, ParityOption::None);
                assert_eq!(options.flow_control, FlowControlOption::None);
            }
            other => panic!("expected serial options, got {:?}", other),
        }
    }
}
