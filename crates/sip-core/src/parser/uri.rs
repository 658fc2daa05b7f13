//! SIP URI grammar (simplified RFC 3261 §25.1 `SIP-URI`).

use nom::branch::alt;
use nom::bytes::complete::{tag_no_case, take_till, take_till1, take_while1};
use nom::character::complete::char;
use nom::combinator::{map, opt};
use nom::sequence::{preceded, separated_pair};
use nom::IResult;

use crate::types::params::ParamList;
use crate::types::uri::{Scheme, Uri};

fn is_scheme_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'+' || c == b'-' || c == b'.'
}

fn scheme(input: &[u8]) -> IResult<&[u8], Scheme> {
    let (rest, tok) = take_while1(is_scheme_char)(input)?;
    let (rest, _) = char(':')(rest)?;
    let s = String::from_utf8_lossy(tok).to_string();
    let scheme = match s.to_ascii_lowercase().as_str() {
        "sip" => Scheme::Sip,
        "sips" => Scheme::Sips,
        _ => Scheme::Other(s),
    };
    Ok((rest, scheme))
}

fn userinfo(input: &[u8]) -> IResult<&[u8], (String, Option<String>)> {
    let (rest, (user, password)) = nom::sequence::terminated(
        nom::branch::alt((
            separated_pair(
                map(take_till1(|c| c == b':' || c == b'@'), |b| {
                    String::from_utf8_lossy(b).to_string()
                }),
                char(':'),
                map(take_till1(|c: u8| c == b'@'), |b: &[u8]| {
                    Some(String::from_utf8_lossy(b).to_string())
                }),
            ),
            map(take_till1(|c| c == b'@'), |b: &[u8]| {
                (String::from_utf8_lossy(b).to_string(), None)
            }),
        )),
        char('@'),
    )(input)?;
    Ok((rest, (user, password)))
}

fn host(input: &[u8]) -> IResult<&[u8], String> {
    let (rest, h) = take_till1(|c| c == b':' || c == b';' || c == b'?')(input)?;
    Ok((rest, String::from_utf8_lossy(h).to_string()))
}

fn port(input: &[u8]) -> IResult<&[u8], u16> {
    let (rest, digits) = preceded(char(':'), nom::character::complete::digit1)(input)?;
    let p: u16 = String::from_utf8_lossy(digits).parse().unwrap_or(0);
    Ok((rest, p))
}

fn param(input: &[u8]) -> IResult<&[u8], (String, Option<String>)> {
    let (rest, _) = char(';')(input)?;
    let (rest, name) = take_till1(|c| c == b'=' || c == b';' || c == b'?')(rest)?;
    let (rest, value) = opt(preceded(
        char('='),
        take_till(|c| c == b';' || c == b'?'),
    ))(rest)?;
    Ok((
        rest,
        (
            String::from_utf8_lossy(name).to_string(),
            value.map(|v| String::from_utf8_lossy(v).to_string()),
        ),
    ))
}

fn params(input: &[u8]) -> IResult<&[u8], ParamList> {
    let mut list = ParamList::new();
    let mut rest = input;
    while let Ok((r, (name, value))) = param(rest) {
        list.push(name, value);
        rest = r;
    }
    Ok((rest, list))
}

/// Parse a full SIP/SIPS (or opaque-scheme) URI.
pub fn parse_uri(input: &[u8]) -> IResult<&[u8], Uri> {
    let (rest, scheme) = scheme(input)?;
    let (rest, userinfo) = opt(userinfo)(rest)?;
    let (rest, host) = host(rest)?;
    let (rest, port) = opt(port)(rest)?;
    let (rest, params) = params(rest)?;
    let (rest, headers) = opt(preceded(char('?'), take_till(|_| false)))(rest)?;

    let (user, password) = userinfo.unzip();
    Ok((
        rest,
        Uri {
            scheme,
            user,
            password: password.flatten(),
            host,
            port,
            params,
            headers: headers.map(|h| String::from_utf8_lossy(h).to_string()),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_user_host_port() {
        let (rest, uri) = parse_uri(b"sip:alice@atlanta.com:5060").unwrap();
        assert!(rest.is_empty());
        assert_eq!(uri.user.as_deref(), Some("alice"));
        assert_eq!(uri.port, Some(5060));
    }

    #[test]
    fn parses_password_and_params() {
        let (_, uri) = parse_uri(b"sip:alice:secret@atlanta.com;transport=tcp").unwrap();
        assert_eq!(uri.password.as_deref(), Some("secret"));
        assert_eq!(uri.transport_param().as_deref(), Some("TCP"));
    }

    #[test]
    fn parses_bare_host_no_userinfo() {
        let (_, uri) = parse_uri(b"sip:biloxi.com").unwrap();
        assert!(uri.user.is_none());
        assert_eq!(uri.host, "biloxi.com");
    }
}
