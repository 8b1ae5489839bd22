//! Byte-level contract with the board's MicroPython REPL.

/// Interrupts a running program (Ctrl-C) and returns to the prompt.
pub const BREAK: &[u8] = b"\x03";

/// Enters paste mode (Ctrl-E); the device stops echoing line by line.
pub const PASTE_ENTER: &[u8] = b"\x05";

/// Leaves paste mode (Ctrl-D) and executes the pasted block.
pub const PASTE_EXIT: &[u8] = b"\x04";

/// Line terminator the REPL expects on commands.
pub const COMMAND_TERMINATOR: &str = "\r";

/// Script that drops the board into its UF2 bootloader.
pub const BOOTLOADER_SCRIPT: &str = "import machine\nmachine.bootloader()\n";

/// Script that resets the board.
pub const RESET_SCRIPT: &str = "import machine\nmachine.reset()\n";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_bytes() {
        assert_eq!(BREAK, &[0x03]);
        assert_eq!(PASTE_ENTER, &[0x05]);
        assert_eq!(PASTE_EXIT, &[0x04]);
        assert_eq!(COMMAND_TERMINATOR.as_bytes(), &[0x0d]);
    }

    #[test]
    fn test_scripts_are_complete_lines() {
        assert!(BOOTLOADER_SCRIPT.ends_with('\n'));
        assert!(RESET_SCRIPT.ends_with('\n'));
        assert!(BOOTLOADER_SCRIPT.contains("machine.bootloader()"));
        assert!(RESET_SCRIPT.contains("machine.reset()"));
    }
}
