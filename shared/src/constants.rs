pub const DEVICE_NAME: &str = "/dev/mychardev";
pub const MAJOR_NUMBER: u32 = 250;
pub const MINOR_NUMBER: u32 = 0;
pub const DRIVER_VERSION: &str = "1.0.0";

/// Initial ring capacity when the config does not override it.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;
/// Upper bound for any resize.
pub const MAX_BUFFER_SIZE: usize = 8192;
/// Size used by SET_BUFFER_SIZE when no argument is supplied.
pub const IOCTL_DEFAULT_BUFFER_SIZE: usize = 2048;

/// Retained entries in the device event stream.
pub const EVENT_LOG_CAPACITY: usize = 100;

/// `_IO('k', n)`-style command numbers.
pub const IOCTL_MAGIC: u32 = b'k' as u32;
pub const IOCTL_CLEAR_BUFFER: u32 = (IOCTL_MAGIC << 8) | 0x01;
pub const IOCTL_SET_BUFFER_SIZE: u32 = (IOCTL_MAGIC << 8) | 0x02;
pub const IOCTL_ENABLE_LOGGING: u32 = (IOCTL_MAGIC << 8) | 0x03;
