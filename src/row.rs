//! Fixed-width row format.
//!
//! A row is stored as:
//! ```text
//! [id: u32 LE]            4 bytes
//! [username: bytes + NUL] 33 bytes
//! [email: bytes + NUL]    256 bytes
//! ```
//! Text columns are NUL padded; decoding stops at the first NUL.

use std::fmt;

use bytes::{Buf, BufMut};

use crate::error::{Error, Result};

/// Maximum username length in bytes.
pub const COLUMN_USERNAME_SIZE: usize = 32;
/// Maximum email length in bytes.
pub const COLUMN_EMAIL_SIZE: usize = 255;

/// Encoded size of the id column.
pub const ID_SIZE: usize = std::mem::size_of::<u32>();
/// Encoded size of the username column (text plus terminator).
pub const USERNAME_SIZE: usize = COLUMN_USERNAME_SIZE + 1;
/// Encoded size of the email column (text plus terminator).
pub const EMAIL_SIZE: usize = COLUMN_EMAIL_SIZE + 1;

/// Byte offset of the id column.
pub const ID_OFFSET: usize = 0;
/// Byte offset of the username column.
pub const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
/// Byte offset of the email column.
pub const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;
/// Total encoded row size.
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_SIZE + EMAIL_SIZE;

/// A single table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    id: u32,
    username: String,
    email: String,
}

impl Row {
    /// Creates a row, rejecting text columns that exceed their capacity or
    /// contain NUL bytes.
    pub fn new(id: u32, username: impl Into<String>, email: impl Into<String>) -> Result<Self> {
        let username = username.into();
        let email = email.into();

        if username.len() > COLUMN_USERNAME_SIZE {
            return Err(Error::StringTooLong {
                column: "username",
                len: username.len(),
                max: COLUMN_USERNAME_SIZE,
            });
        }
        if email.len() > COLUMN_EMAIL_SIZE {
            return Err(Error::StringTooLong {
                column: "email",
                len: email.len(),
                max: COLUMN_EMAIL_SIZE,
            });
        }

        if username.contains('\0') || email.contains('\0') {
            return Err(Error::invalid_argument("Row text may not contain NUL bytes"));
        }

        Ok(Self { id, username, email })
    }

    /// The row key.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The username column.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The email column.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Encodes the row into its fixed-width representation.
    pub fn encode(&self) -> [u8; ROW_SIZE] {
        let mut buf = [0u8; ROW_SIZE];
        {
            let mut dst = &mut buf[..];
            dst.put_u32_le(self.id);
            put_padded(&mut dst, self.username.as_bytes(), USERNAME_SIZE);
            put_padded(&mut dst, self.email.as_bytes(), EMAIL_SIZE);
        }
        buf
    }

    /// Decodes a row from the first `ROW_SIZE` bytes of `data`.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < ROW_SIZE {
            return Err(Error::corruption(format!(
                "Row buffer too short: {} bytes (need {})",
                data.len(),
                ROW_SIZE
            )));
        }

        let mut src = &data[..ROW_SIZE];
        let id = src.get_u32_le();
        let username = take_padded(&mut src, USERNAME_SIZE);
        let email = take_padded(&mut src, EMAIL_SIZE);

        Ok(Self { id, username, email })
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.id, self.username, self.email)
    }
}

fn put_padded(dst: &mut &mut [u8], value: &[u8], width: usize) {
    debug_assert!(value.len() < width);
    dst.put_slice(value);
    dst.put_bytes(0, width - value.len());
}

fn take_padded(src: &mut &[u8], width: usize) -> String {
    let field = &src[..width];
    let end = field.iter().position(|&b| b == 0).unwrap_or(width);
    let value = String::from_utf8_lossy(&field[..end]).into_owned();
    src.advance(width);
    value
}
