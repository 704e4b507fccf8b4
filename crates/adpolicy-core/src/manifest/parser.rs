//! App manifest config parser (panic-free).
//!
//! Accepted document:
//!
//! ```xml
//! <ad-services-config>
//!     <includes-sdk-library name="1234" />
//!     <attribution allowAll="false" allowAdPartnersToAccess="1234" />
//!     <custom-audiences allowAll="true" />
//!     <topics allowAdPartnersToAccess="1234567, 42" />
//! </ad-services-config>
//! ```
//!
//! Tags and attributes are case-sensitive. Attribute values may not contain
//! `>`; partner lists are identifiers so this never matters in practice.

use std::collections::BTreeSet;

use crate::error::{AdPolicyError, Result};

use super::config::{ApiAccessConfig, ApiSurface, AppManifestConfig, IncludesSdkLibraryConfig};

const ROOT_TAG: &str = "ad-services-config";
const SDK_LIBRARY_TAG: &str = "includes-sdk-library";
const ATTR_ALLOW_ALL: &str = "allowAll";
const ATTR_ALLOW_AD_PARTNERS: &str = "allowAdPartnersToAccess";
const ATTR_SDK_NAME: &str = "name";

fn parse_err(msg: impl Into<String>) -> AdPolicyError {
    AdPolicyError::ManifestParse(msg.into())
}

/// Parse a manifest config document.
///
/// `enabled_by_default` decides what a missing API section means: access for
/// everyone when true, no access when false.
pub fn parse_config(xml: &str, enabled_by_default: bool) -> Result<AppManifestConfig> {
    let mut lexer = Lexer { rest: xml };

    let root_self_closing = match lexer.next_token()? {
        Some(Token::Start { name, attrs, self_closing }) if name == ROOT_TAG => {
            if let Some((attr, _)) = attrs.first() {
                return Err(unknown_attribute(attr));
            }
            self_closing
        }
        _ => return Err(parse_err(format!("expected START_TAG {ROOT_TAG}"))),
    };

    let mut cfg = AppManifestConfig {
        enabled_by_default,
        ..Default::default()
    };
    let mut sdks = BTreeSet::new();

    if !root_self_closing {
        loop {
            match lexer.next_token()? {
                None => {
                    return Err(parse_err(format!("missing END_TAG {ROOT_TAG}")));
                }
                Some(Token::End { name }) if name == ROOT_TAG => break,
                Some(Token::End { name }) => {
                    return Err(parse_err(format!("unexpected END_TAG {name}")));
                }
                Some(Token::Start { name, attrs, self_closing }) => {
                    if name == SDK_LIBRARY_TAG {
                        sdks.insert(parse_sdk_library(&attrs)?);
                    } else if let Some(surface) = ApiSurface::from_tag(name) {
                        if cfg.section(surface).is_some() {
                            return Err(parse_err(format!("Tag {name} appears more than once")));
                        }
                        *cfg.section_mut(surface) = Some(parse_access(&attrs)?);
                    } else {
                        return Err(unknown_tag(name));
                    }

                    if !self_closing {
                        lexer.expect_end(name)?;
                    }
                }
            }
        }
    }

    if lexer.next_token()?.is_some() {
        return Err(parse_err(format!("unexpected content after END_TAG {ROOT_TAG}")));
    }

    cfg.includes_sdk_library = IncludesSdkLibraryConfig::new(sdks, enabled_by_default);
    Ok(cfg)
}

fn parse_access(attrs: &[(&str, String)]) -> Result<ApiAccessConfig> {
    let mut allow_all = false;
    let mut allow_ad_partners = BTreeSet::new();

    for (attr, value) in attrs {
        match *attr {
            ATTR_ALLOW_ALL => allow_all = parse_bool(attr, value)?,
            ATTR_ALLOW_AD_PARTNERS => allow_ad_partners = split_partners(value),
            other => return Err(unknown_attribute(other)),
        }
    }

    if allow_all && !allow_ad_partners.is_empty() {
        return Err(parse_err(
            "allowAll cannot be set to true when allowAdPartners is also set",
        ));
    }

    Ok(ApiAccessConfig { allow_all, allow_ad_partners })
}

fn parse_sdk_library(attrs: &[(&str, String)]) -> Result<String> {
    let mut sdk_name = None;
    for (attr, value) in attrs {
        match *attr {
            ATTR_SDK_NAME => sdk_name = Some(value.trim().to_string()),
            other => return Err(unknown_attribute(other)),
        }
    }
    sdk_name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| parse_err(format!("Sdk name not mentioned in <{SDK_LIBRARY_TAG}>")))
}

fn parse_bool(attr: &str, value: &str) -> Result<bool> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(parse_err(format!("invalid boolean for {attr}: {other}"))),
    }
}

fn split_partners(value: &str) -> BTreeSet<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn unknown_tag(tag: &str) -> AdPolicyError {
    parse_err(format!("Unknown tag: {tag} [Tags and attributes are case sensitive]"))
}

fn unknown_attribute(attr: &str) -> AdPolicyError {
    parse_err(format!("Unknown attribute: {attr} [Tags and attributes are case sensitive]"))
}

#[derive(Debug)]
enum Token<'a> {
    Start {
        name: &'a str,
        attrs: Vec<(&'a str, String)>,
        self_closing: bool,
    },
    End {
        name: &'a str,
    },
}

/// Minimal XML tokenizer: elements and attributes only.
/// Skips the prolog, comments and whitespace; any other text is an error.
struct Lexer<'a> {
    rest: &'a str,
}

impl<'a> Lexer<'a> {
    fn next_token(&mut self) -> Result<Option<Token<'a>>> {
        loop {
            let input = self.rest.trim_start();
            self.rest = input;
            if input.is_empty() {
                return Ok(None);
            }

            let Some(after_lt) = input.strip_prefix('<') else {
                let text = input.split('<').next().unwrap_or_default().trim();
                return Err(parse_err(format!("unexpected text: {text}")));
            };

            if let Some(after) = after_lt.strip_prefix("!--") {
                let (_, tail) = after
                    .split_once("-->")
                    .ok_or_else(|| parse_err("unterminated comment"))?;
                self.rest = tail;
                continue;
            }
            if let Some(after) = after_lt.strip_prefix('?') {
                let (_, tail) = after
                    .split_once("?>")
                    .ok_or_else(|| parse_err("unterminated processing instruction"))?;
                self.rest = tail;
                continue;
            }

            let end = tag_end(after_lt).ok_or_else(|| parse_err("unterminated tag"))?;
            let (body, tail) = (&after_lt[..end], &after_lt[end + 1..]);
            self.rest = tail;

            if let Some(name) = body.strip_prefix('/') {
                return Ok(Some(Token::End { name: name.trim() }));
            }

            let (body, self_closing) = match body.strip_suffix('/') {
                Some(b) => (b, true),
                None => (body, false),
            };
            return parse_start(body, self_closing).map(Some);
        }
    }

    fn expect_end(&mut self, tag: &str) -> Result<()> {
        match self.next_token()? {
            Some(Token::End { name }) if name == tag => Ok(()),
            Some(Token::Start { name, .. }) => {
                if ApiSurface::from_tag(name).is_some() || name == SDK_LIBRARY_TAG {
                    Err(parse_err(format!("expected END_TAG {tag}, found START_TAG {name}")))
                } else {
                    Err(unknown_tag(name))
                }
            }
            _ => Err(parse_err(format!("expected END_TAG {tag}"))),
        }
    }
}

/// Byte offset of the `>` closing a tag, skipping quoted attribute values.
fn tag_end(tag: &str) -> Option<usize> {
    let mut quote = None;
    for (i, b) in tag.bytes().enumerate() {
        match (quote, b) {
            (None, b'>') => return Some(i),
            (None, b'"' | b'\'') => quote = Some(b),
            (Some(q), _) if q == b => quote = None,
            _ => {}
        }
    }
    None
}

fn parse_start(body: &str, self_closing: bool) -> Result<Token<'_>> {
    let body = body.trim();
    let (name, mut rest) = match body.split_once(char::is_whitespace) {
        Some((n, r)) => (n, r),
        None => (body, ""),
    };
    if name.is_empty() {
        return Err(parse_err("empty tag name"));
    }

    let mut attrs: Vec<(&str, String)> = Vec::new();
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }

        let (attr, after_eq) = rest
            .split_once('=')
            .ok_or_else(|| parse_err(format!("attribute without value in <{name}>")))?;
        let attr = attr.trim();
        let after_eq = after_eq.trim_start();

        let (quote, quoted) = ['"', '\'']
            .into_iter()
            .find_map(|q| after_eq.strip_prefix(q).map(|s| (q, s)))
            .ok_or_else(|| parse_err(format!("unquoted value for {attr} in <{name}>")))?;
        let (raw, tail) = quoted
            .split_once(quote)
            .ok_or_else(|| parse_err(format!("unterminated value for {attr} in <{name}>")))?;

        if attrs.iter().any(|(a, _)| *a == attr) {
            return Err(parse_err(format!("Attribute {attr} appears more than once")));
        }
        attrs.push((attr, unescape(raw)));
        rest = tail;
    }

    Ok(Token::Start { name, attrs, self_closing })
}

fn unescape(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
