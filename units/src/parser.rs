/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use nom::{
    character::complete::{char, space0},
    combinator::opt,
    sequence::preceded,
    IResult,
};

use super::engine::Scope;
use super::error::{ParseError, UnitsError};
use super::format::scan_double;
use super::function::eval_func;
use super::quantity::Quantity;
use super::reduce;
use super::symbols::{has_subscript, BUILTINS};

/// Characters that terminate a unit name.
const NON_UNIT_CHARS: &str = "~;+-*/|^()[],.#";

type PResult<'a, T> = IResult<&'a str, T, PError<'a>>;

/// Parser error carrying the remaining input (for the byte offset) and,
/// for semantic failures, the engine error that caused them.
#[derive(Debug)]
pub struct PError<'a> {
    input: &'a str,
    kind: Option<UnitsError>,
}

impl<'a> nom::error::ParseError<&'a str> for PError<'a> {
    fn from_error_kind(input: &'a str, _: nom::error::ErrorKind) -> Self {
        PError { input, kind: None }
    }

    fn append(_: &'a str, _: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

fn fail<'a, T>(input: &'a str, kind: UnitsError) -> PResult<'a, T> {
    Err(nom::Err::Failure(PError {
        input,
        kind: Some(kind),
    }))
}

/// Parse an expression to a quantity, resolving unit names against the
/// scope. The result is not reduced. Errors carry the byte offset of the
/// offending input.
pub fn parse_quantity(
    input: &str,
    scope: &Scope,
) -> Result<Quantity, ParseError> {
    let parsed = match expr(input, scope) {
        Ok((rest, quantity)) => match space0::<_, PError>(rest) {
            Ok(("", _)) => return Ok(quantity),
            _ => Err(ParseError {
                kind: UnitsError::Parse,
                offset: input.len() - rest.trim_start().len(),
            }),
        },
        Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => {
            Err(ParseError {
                kind: err.kind.unwrap_or(UnitsError::Parse),
                offset: input.len().saturating_sub(err.input.len()),
            })
        }
        Err(nom::Err::Incomplete(_)) => Err(ParseError {
            kind: UnitsError::Parse,
            offset: input.len(),
        }),
    };
    parsed
}

/* Sums and differences of conformable quantities. Subtraction applies
 * only when the minus-means-subtract option is active; a leading minus
 * negates. */

fn expr<'a>(input: &'a str, scope: &Scope) -> PResult<'a, Quantity> {
    let (input, _) = space0(input)?;
    let (input, neg) = match scope.minus_subtracts() {
        true => opt(char('-'))(input)?,
        false => (input, None),
    };
    let (mut input, mut left) = product(input, scope)?;
    if neg.is_some() {
        left.factor = -left.factor;
    }
    loop {
        let op = match preceded(space0, nom::character::complete::one_of("+-"))(
            input,
        ) {
            Ok((rest, c)) => {
                if c == '-' && !scope.minus_subtracts() {
                    return Ok((input, left));
                }
                Some((rest, c))
            }
            Err(nom::Err::Failure(err)) => return Err(nom::Err::Failure(err)),
            Err(_) => None,
        };
        let (rest, c) = match op {
            Some(found) => found,
            None => return Ok((input, left)),
        };
        let (rest, _) = space0(rest)?;
        let (rest, inner_neg) = opt(char('-'))(rest)?;
        let (rest, mut right) = product(rest, scope)?;
        if (c == '-') != inner_neg.is_some() {
            right.factor = -right.factor;
        }
        if let Err(err) = reduce::add(&mut left, right, scope) {
            return fail(input, err);
        }
        input = rest;
    }
}

/* Products and quotients. `*` and `/` share a precedence level and
 * associate left; juxtaposition binds tighter and is handled below. A
 * leading `/` divides one, so that definitions like `/s` work. */

fn product<'a>(input: &'a str, scope: &Scope) -> PResult<'a, Quantity> {
    let (mut input, mut left) = match opt(char('/'))(input)? {
        (rest, Some(_)) => {
            let (rest, _) = space0(rest)?;
            let (rest, operand) = juxtaposition(rest, scope)?;
            let mut one = Quantity::one();
            if let Err(err) = one.div_assign(operand) {
                return fail(input, err);
            }
            (rest, one)
        }
        (rest, None) => juxtaposition(rest, scope)?,
    };
    loop {
        let op = match product_op(input, scope) {
            Ok(found) => Some(found),
            Err(nom::Err::Failure(err)) => return Err(nom::Err::Failure(err)),
            Err(_) => None,
        };
        let (rest, divide) = match op {
            Some(found) => found,
            None => return Ok((input, left)),
        };
        let (rest, _) = space0(rest)?;
        let (rest, right) = juxtaposition(rest, scope)?;
        let result = match divide {
            true => left.div_assign(right),
            false => left.mul_assign(right),
        };
        if let Err(err) = result {
            return fail(input, err);
        }
        input = rest;
    }
}

/// A multiplication or division operator: `*`, `/`, the word `per`, or
/// `-` when minus does not mean subtraction.
fn product_op<'a>(input: &'a str, scope: &Scope) -> PResult<'a, bool> {
    let (rest, _) = space0(input)?;
    if let Ok((rest, _)) = char::<_, PError>('*')(rest) {
        return Ok((rest, false));
    }
    if let Ok((rest, _)) = char::<_, PError>('/')(rest) {
        return Ok((rest, true));
    }
    if !scope.minus_subtracts() {
        if let Ok((rest, _)) = char::<_, PError>('-')(rest) {
            return Ok((rest, false));
        }
    }
    if let Some(after) = rest.strip_prefix("per") {
        if after.chars().next().map_or(false, |c| c == ' ' || c == '\t') {
            return Ok((after, true));
        }
    }
    Err(nom::Err::Error(PError {
        input: rest,
        kind: None,
    }))
}

/* Juxtaposition: adjacent factors multiply and bind tighter than
 * division, so `m/s s` is m/(s s). */

fn juxtaposition<'a>(input: &'a str, scope: &Scope) -> PResult<'a, Quantity> {
    let (mut input, mut left) = power(input, scope)?;
    loop {
        match preceded(space0, |i| power(i, scope))(input) {
            Ok((rest, right)) => {
                if let Err(err) = left.mul_assign(right) {
                    return fail(input, err);
                }
                input = rest;
            }
            Err(nom::Err::Failure(err)) => return Err(nom::Err::Failure(err)),
            Err(_) => return Ok((input, left)),
        }
    }
}

/* Exponentiation, right associative: `^` or `**`, Unicode superscripts,
 * and the single-digit shorthand handled in the unit token. */

fn power<'a>(input: &'a str, scope: &Scope) -> PResult<'a, Quantity> {
    let (input, mut base) = atom(input, scope)?;
    if let Ok((rest, n)) = superscript_power(input) {
        if let Err(err) = base.powi(n) {
            return fail(input, err);
        }
        return Ok((rest, base));
    }
    let rest = match preceded(space0::<_, PError>, char('^'))(input) {
        Ok((rest, _)) => rest,
        Err(_) => match preceded(
            space0::<_, PError>,
            nom::bytes::complete::tag("**"),
        )(input)
        {
            Ok((rest, _)) => rest,
            Err(_) => return Ok((input, base)),
        },
    };
    let (rest, _) = space0(rest)?;
    let (rest, neg) = opt(char('-'))(rest)?;
    let (rest, mut exponent) = power(rest, scope)?;
    if neg.is_some() {
        exponent.factor = -exponent.factor;
    }
    if let Err(err) = reduce::unit_power(&mut base, exponent, scope) {
        return fail(input, err);
    }
    Ok((rest, base))
}

/* Atoms: numeric literals (with `a|b` fractions), parenthesised
 * expressions, builtin and user function calls, the last-result
 * placeholder and unit names. */

fn atom<'a>(input: &'a str, scope: &Scope) -> PResult<'a, Quantity> {
    match input.chars().next() {
        Some(c) if c.is_ascii_digit() || c == '.' => number(input),
        Some('(') => {
            let (rest, quantity) = paren(input, scope)?;
            Ok((rest, quantity))
        }
        Some('~') => inverse_call(input, scope),
        Some(c) if !NON_UNIT_CHARS.contains(c) && !c.is_whitespace() => {
            name_atom(input, scope)
        }
        _ => Err(nom::Err::Error(PError { input, kind: None })),
    }
}

fn paren<'a>(input: &'a str, scope: &Scope) -> PResult<'a, Quantity> {
    let (rest, _) = char('(')(input)?;
    let (rest, quantity) = expr(rest, scope)?;
    let (rest, _) = space0(rest)?;
    match char::<_, PError>(')')(rest) {
        Ok((rest, _)) => Ok((rest, quantity)),
        Err(_) => fail(rest, UnitsError::Parse),
    }
}

fn number(input: &str) -> PResult<'_, Quantity> {
    let (value, used) = match scan_double(input) {
        Some(scanned) => scanned,
        None => return Err(nom::Err::Error(PError { input, kind: None })),
    };
    let rest = &input[used..];
    match rest.strip_prefix('|') {
        Some(denom_input) => match scan_double(denom_input) {
            Some((denominator, used)) if denominator != 0.0 => Ok((
                &denom_input[used..],
                Quantity::from_factor(value / denominator),
            )),
            _ => fail(rest, UnitsError::BadNumber),
        },
        None => Ok((rest, Quantity::from_factor(value))),
    }
}

fn inverse_call<'a>(input: &'a str, scope: &Scope) -> PResult<'a, Quantity> {
    let (rest, _) = char('~')(input)?;
    let (rest, _) = space0(rest)?;
    let (rest, name) = unit_name(rest)?;
    let entry = match scope.symbols().function(name) {
        Some(entry) => entry,
        None => return fail(input, UnitsError::NotAFunction(name.to_string())),
    };
    let (rest, arg) = match preceded(space0::<_, PError>, |i| paren(i, scope))(
        rest,
    ) {
        Ok(found) => found,
        Err(nom::Err::Failure(err)) => return Err(nom::Err::Failure(err)),
        Err(_) => return fail(rest, UnitsError::Parse),
    };
    match eval_func(scope, entry, arg, true, true) {
        Ok(result) => Ok((rest, result)),
        Err(err) => fail(input, err),
    }
}

fn name_atom<'a>(input: &'a str, scope: &Scope) -> PResult<'a, Quantity> {
    let (rest, name) = unit_name(input)?;
    if BUILTINS.contains(&name) {
        if name == "per" {
            return Err(nom::Err::Error(PError { input, kind: None }));
        }
        let (rest, arg) =
            match preceded(space0::<_, PError>, |i| paren(i, scope))(rest) {
                Ok(found) => found,
                Err(nom::Err::Failure(err)) => {
                    return Err(nom::Err::Failure(err))
                }
                Err(_) => {
                    return Err(nom::Err::Error(PError { input, kind: None }))
                }
            };
        return match apply_builtin(name, arg, scope) {
            Ok(result) => Ok((rest, result)),
            Err(err) => fail(input, err),
        };
    }
    if name == "_" {
        return match scope.last_result() {
            Some(last) => Ok((rest, last.clone())),
            None => fail(input, UnitsError::LastUnset),
        };
    }
    if let Some(bound) = scope.binding(name) {
        return Ok((rest, bound.clone()));
    }
    if let Some(entry) = scope.symbols().function(name) {
        let (rest, arg) =
            match preceded(space0::<_, PError>, |i| paren(i, scope))(rest) {
                Ok(found) => found,
                Err(nom::Err::Failure(err)) => {
                    return Err(nom::Err::Failure(err))
                }
                Err(_) => {
                    return Err(nom::Err::Error(PError { input, kind: None }))
                }
            };
        return match eval_func(scope, entry, arg, false, true) {
            Ok(result) => Ok((rest, result)),
            Err(err) => fail(input, err),
        };
    }
    /* An ordinary unit token. A trailing digit 2-9 without a subscript is
     * a power, as in `m3`. */
    let (stem, exponent) = split_trailing_power(name);
    let mut quantity = Quantity::from_unit(stem);
    if exponent != 1 {
        if let Err(err) = quantity.powi(exponent) {
            return fail(input, err);
        }
    }
    Ok((rest, quantity))
}

fn unit_name(input: &str) -> PResult<'_, &str> {
    nom::bytes::complete::take_while1(|c: char| {
        !NON_UNIT_CHARS.contains(c)
            && !c.is_whitespace()
            && !is_superscript(c)
    })(input)
}

fn split_trailing_power(name: &str) -> (&str, i32) {
    let mut chars = name.chars().rev();
    match (chars.next(), chars.next()) {
        (Some(last), Some(prev))
            if ('2'..='9').contains(&last)
                && !prev.is_ascii_digit()
                && !has_subscript(name) =>
        {
            (
                &name[..name.len() - 1],
                last.to_digit(10).unwrap() as i32,
            )
        }
        _ => (name, 1),
    }
}

fn apply_builtin(
    name: &str,
    mut arg: Quantity,
    scope: &Scope,
) -> Result<Quantity, UnitsError> {
    match name {
        "sqrt" => {
            reduce::root(&mut arg, scope, 2)?;
            Ok(arg)
        }
        "cuberoot" => {
            reduce::root(&mut arg, scope, 3)?;
            Ok(arg)
        }
        _ => {
            reduce::complete_reduce(&mut arg, scope)?;
            if !reduce::is_dimensionless(&mut arg, scope) {
                return Err(UnitsError::BadFuncArg);
            }
            let x = arg.factor;
            let value = match name {
                "sin" => x.sin(),
                "cos" => x.cos(),
                "tan" => x.tan(),
                "asin" => x.asin(),
                "acos" => x.acos(),
                "atan" => x.atan(),
                "sinh" => x.sinh(),
                "cosh" => x.cosh(),
                "tanh" => x.tanh(),
                "asinh" => x.asinh(),
                "acosh" => x.acosh(),
                "atanh" => x.atanh(),
                "ln" => x.ln(),
                "log" => x.log10(),
                "exp" => x.exp(),
                _ => return Err(UnitsError::NotAFunction(name.to_string())),
            };
            match value.is_finite() {
                true => Ok(Quantity::from_factor(value)),
                false => Err(UnitsError::Math("result out of range")),
            }
        }
    }
}

/* Unicode superscript exponents, e.g. m² or s⁻¹. */

fn superscript_power(input: &str) -> PResult<'_, i32> {
    let (input, sign) = opt(superscript_sign)(input)?;
    let (input, digits) = nom::multi::many1(superscript_digit)(input)?;
    let value = digits.iter().fold(0i32, |n, d| n * 10 + d);
    Ok((input, sign.unwrap_or(1) * value))
}

fn superscript_sign(input: &str) -> PResult<'_, i32> {
    match input.chars().next() {
        Some('⁻') => Ok((&input['⁻'.len_utf8()..], -1)),
        Some('⁺') => Ok((&input['⁺'.len_utf8()..], 1)),
        _ => Err(nom::Err::Error(PError { input, kind: None })),
    }
}

fn superscript_digit(input: &str) -> PResult<'_, i32> {
    static SS: [char; 10] =
        ['⁰', '¹', '²', '³', '⁴', '⁵', '⁶', '⁷', '⁸', '⁹'];
    match input.chars().next() {
        Some(c) => match SS.iter().position(|s| *s == c) {
            Some(digit) => {
                Ok((&input[c.len_utf8()..], digit as i32))
            }
            None => Err(nom::Err::Error(PError { input, kind: None })),
        },
        None => Err(nom::Err::Error(PError { input, kind: None })),
    }
}

fn is_superscript(c: char) -> bool {
    matches!(
        c,
        '⁰' | '¹' | '²' | '³' | '⁴' | '⁵' | '⁶' | '⁷' | '⁸' | '⁹' | '⁻' | '⁺'
    )
}
