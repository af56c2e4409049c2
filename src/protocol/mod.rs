//! Wire protocol between the host tool and the programmer.
//!
//! Commands are a single opcode byte followed by a fixed, opcode-specific
//! argument payload; responses are short ASCII lines. There is no framing
//! and no resynchronization: both sides must agree on the exact argument
//! count of every opcode, or every following byte is misread as an opcode.
//!
//! | opcode | arguments                 | response          |
//! |--------|---------------------------|-------------------|
//! | `l`    | bank, high, low           | `l\n`             |
//! | `r`    | bank, high, low           | `r: '<byte>'\n`   |
//! | `s`    | decimal value as text     | `s: '<value>'\n`  |
//! | `w`    | bank, high, low, value    | `a\n`             |
//! | `W`    | bank, high, 256 values    | `a\n`             |
//! | other  | none                      | ` - <opcode>\n`   |
//!
//! Argument bytes are raw binary, not text; only the `s` payload and the
//! responses are ASCII.

mod client;
mod server;

pub use self::client::Remote;
pub use self::server::serve;

const CMD_PARK: u8 = b'l';
const CMD_READ: u8 = b'r';
const CMD_SET_EXTENDED: u8 = b's';
const CMD_WRITE_BYTE: u8 = b'w';
const CMD_WRITE_PAGE: u8 = b'W';
