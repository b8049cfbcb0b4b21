//! SPICE-style numeric literals.
//!
//! Configuration values may be written in scientific notation (`1.2e-12`) or
//! with SI suffixes as SPICE accepts them (`1.2p`, `50k`, `3meg`). `meg` is
//! mega; a lone `m` is milli.

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while},
    character::complete::char,
    combinator::{opt, recognize},
    number::complete::double,
    sequence::tuple,
    IResult,
};

/// Parse a numeric literal with an optional SI suffix.
///
/// Returns `None` for malformed input or an unknown suffix. The tokens `NA`
/// and `NC` are not numbers and are rejected here; callers treat them as
/// unset/no-connect before asking for a value.
pub fn parse_spice_number(input: &str) -> Option<f64> {
    let input = input.trim();
    match spice_number(input) {
        Ok(("", value)) => Some(value),
        _ => None,
    }
}

fn spice_number(input: &str) -> IResult<&str, f64> {
    let (rest, (value, suffix)) = tuple((double, opt(si_suffix)))(input)?;
    // SPICE ignores trailing unit letters after the scale factor (e.g. "pF").
    let (rest, _) = take_while(|c: char| c.is_ascii_alphabetic())(rest)?;
    Ok((rest, value * suffix.unwrap_or(1.0)))
}

fn si_suffix(input: &str) -> IResult<&str, f64> {
    alt((
        // "meg" must match before a bare "m".
        nom::combinator::value(1e6, tag_no_case("meg")),
        nom::combinator::value(1e12, tag_no_case("t")),
        nom::combinator::value(1e9, tag_no_case("g")),
        nom::combinator::value(1e3, tag_no_case("k")),
        nom::combinator::value(1e-3, tag_no_case("m")),
        nom::combinator::value(1e-6, recognize(alt((char('u'), char('U'), char('µ'))))),
        nom::combinator::value(1e-9, tag_no_case("n")),
        nom::combinator::value(1e-12, tag_no_case("p")),
        nom::combinator::value(1e-15, tag_no_case("f")),
    ))(input)
}
