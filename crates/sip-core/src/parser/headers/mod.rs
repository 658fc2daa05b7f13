//! Typed grammars for the address-family headers and Via.
//!
//! These run lazily: only when a [`crate::types::header::HeaderValue`]'s
//! typed accessor is first called (§4.2 pass 2).

use nom::bytes::complete::{tag_no_case, take_till, take_till1};
use nom::character::complete::{char, digit1, multispace0};
use nom::combinator::opt;
use nom::sequence::{delimited, preceded};
use nom::IResult;

use crate::parser::uri::parse_uri;
use crate::types::address::Address;
use crate::types::params::ParamList;
use crate::types::via::Via;

fn generic_param(input: &[u8]) -> IResult<&[u8], (String, Option<String>)> {
    let (rest, _) = char(';')(input)?;
    let (rest, name) = take_till1(|c| c == b'=' || c == b';')(rest)?;
    let (rest, value) = opt(preceded(char('='), take_till(|c| c == b';')))(rest)?;
    Ok((
        rest,
        (
            String::from_utf8_lossy(name).to_string(),
            value.map(|v| String::from_utf8_lossy(v).to_string()),
        ),
    ))
}

fn generic_params(input: &[u8]) -> IResult<&[u8], ParamList> {
    let mut list = ParamList::new();
    let mut rest = input;
    while let Ok((r, (name, value))) = generic_param(rest) {
        list.push(name, value);
        rest = r;
    }
    Ok((rest, list))
}

/// `SIP/2.0/UDP host:port;branch=...`
pub fn parse_via(input: &[u8]) -> IResult<&[u8], Via> {
    let input = trim_start(input);
    let (rest, _) = tag_no_case("SIP")(input)?;
    let (rest, _) = char('/')(rest)?;
    let (rest, version) = take_till1(|c| c == b'/')(rest)?;
    let (rest, _) = char('/')(rest)?;
    let (rest, transport) = take_till1(|c: u8| c.is_ascii_whitespace())(rest)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, host) = take_till1(|c| c == b':' || c == b';' || c.is_ascii_whitespace())(rest)?;
    let (rest, port) = opt(preceded(char(':'), digit1))(rest)?;
    let (rest, params) = generic_params(rest)?;

    Ok((
        rest,
        Via {
            protocol_name: "SIP".to_string(),
            protocol_version: String::from_utf8_lossy(version).to_string(),
            transport: String::from_utf8_lossy(transport).to_ascii_uppercase(),
            sent_host: String::from_utf8_lossy(host).to_string(),
            sent_port: port.map(|p| String::from_utf8_lossy(p).parse().unwrap_or(0)),
            params,
        },
    ))
}

fn trim_start(input: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < input.len() && input[i].is_ascii_whitespace() {
        i += 1;
    }
    &input[i..]
}

/// `["display name"] <uri> *(;param)` or a bare URI with trailing params.
pub fn parse_address(input: &[u8]) -> IResult<&[u8], Address> {
    let input = trim_start(input);
    if let Ok((rest, (display_name, uri_bytes))) = bracketed(input) {
        let (_, uri) = parse_uri(uri_bytes)?;
        let (rest, params) = generic_params(rest)?;
        return Ok((
            rest,
            Address {
                display_name,
                uri,
                params,
            },
        ));
    }

    // Bare URI, no angle brackets: params belong to the URI itself per
    // RFC 3261, but real peers sometimes place them after a trailing `;`
    // that the URI grammar already consumes, so this is effectively a
    // pass-through.
    let (rest, uri) = parse_uri(input)?;
    let (rest, params) = generic_params(rest)?;
    Ok((
        rest,
        Address {
            display_name: None,
            uri,
            params,
        },
    ))
}

fn bracketed(input: &[u8]) -> IResult<&[u8], (Option<String>, &[u8])> {
    let (rest, display_name) = opt(quoted_or_token)(input)?;
    let rest = trim_start(rest);
    let (rest, uri_bytes) = delimited(char('<'), take_till(|c| c == b'>'), char('>'))(rest)?;
    Ok((rest, (display_name, uri_bytes)))
}

fn quoted_or_token(input: &[u8]) -> IResult<&[u8], String> {
    if input.first() == Some(&b'"') {
        let (rest, name) = delimited(char('"'), take_till(|c| c == b'"'), char('"'))(input)?;
        let rest = trim_start(rest);
        Ok((rest, String::from_utf8_lossy(name).to_string()))
    } else {
        let (rest, name) = take_till1(|c: u8| c == b'<')(input)?;
        let name = String::from_utf8_lossy(name).trim().to_string();
        if name.is_empty() {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )));
        }
        Ok((rest, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_via_with_branch() {
        let (_, via) = parse_via(b"SIP/2.0/UDP pc33.atlanta.com:5060;branch=z9hG4bK776asdhds").unwrap();
        assert_eq!(via.transport, "UDP");
        assert_eq!(via.branch(), Some("z9hG4bK776asdhds"));
    }

    #[test]
    fn parses_bracketed_address_with_display_name() {
        let (_, addr) = parse_address(b"\"Alice\" <sip:alice@atlanta.com>;tag=1928301774").unwrap();
        assert_eq!(addr.display_name.as_deref(), Some("Alice"));
        assert_eq!(addr.tag(), Some("1928301774"));
    }

    #[test]
    fn parses_bracketed_address_without_display_name() {
        let (_, addr) = parse_address(b"<sip:bob@biloxi.com>").unwrap();
        assert!(addr.display_name.is_none());
    }
}
