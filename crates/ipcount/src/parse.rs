// SPDX-FileCopyrightText: 2025 xfnw
//
// SPDX-License-Identifier: MPL-2.0

use std::{net::Ipv4Addr, num::ParseIntError};

#[derive(Debug, PartialEq, Eq, foxerror::FoxError)]
pub enum ParseError {
    /// expected four dot separated fields
    FieldCount(usize),
    /// field is not utf-8
    NotUtf8,
    /// field is not an integer
    NotInteger(ParseIntError),
    /// octet out of range
    OutOfRange(i64),
}

fn parse_octet(field: &[u8]) -> Result<u8, ParseError> {
    let field = std::str::from_utf8(field).map_err(|_| ParseError::NotUtf8)?;
    let value: i64 = field.parse().map_err(ParseError::NotInteger)?;
    u8::try_from(value).map_err(|_| ParseError::OutOfRange(value))
}

/// parse a dotted quad, without its line terminator
///
/// each field is read as a plain integer, so signs and leading zeros are
/// fine as long as the value ends up in `0..=255`. whitespace is not.
pub fn parse_quad(line: &[u8]) -> Result<Ipv4Addr, ParseError> {
    let fields = line.iter().filter(|&&b| b == b'.').count() + 1;
    if fields != 4 {
        return Err(ParseError::FieldCount(fields));
    }

    let mut octets = [0; 4];
    for (slot, field) in octets.iter_mut().zip(line.split(|&b| b == b'.')) {
        *slot = parse_octet(field)?;
    }
    Ok(Ipv4Addr::from(octets))
}
