/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use super::engine::Scope;
use super::error::UnitsError;
use super::parser::parse_quantity;
use super::quantity::Quantity;
use super::symbols::PRIMITIVE_CHAR;

/// Reduction passes are bounded so that a cyclic definition graph shows
/// up as a reduction error instead of non-termination.
const MAX_PASSES: usize = 1000;

/// Denominator bound for rational exponent recovery.
const MAX_DENOMINATOR: i64 = 100;

/// Expand every non-primitive token on one side of the quantity (the
/// numerator, or the denominator when `flip` is set). Each token is looked
/// up, its definition parsed and raised to the token's power, and the
/// result merged in. Returns whether any expansion was performed.
pub fn reduce_once(
    quantity: &mut Quantity,
    scope: &Scope,
    flip: bool,
) -> Result<bool, UnitsError> {
    let mut did_work = false;
    loop {
        let mut target = None;
        for (token, power) in quantity.units() {
            if flip != (power < 0) {
                continue;
            }
            let definition = scope
                .symbols()
                .lookup_unit(token, true)
                .ok_or_else(|| UnitsError::UnknownUnit(token.to_string()))?;
            if definition.contains(PRIMITIVE_CHAR) {
                continue;
            }
            target = Some((
                token.to_string(),
                power,
                definition.into_owned(),
            ));
            break;
        }
        let (token, power, definition) = match target {
            Some(found) => found,
            None => return Ok(did_work),
        };
        log::debug!("expanding {}^{} to '{}'", token, power, definition);
        quantity.take_unit(&token);
        let mut expansion = parse_quantity(&definition, scope)
            .map_err(|_| UnitsError::Reduce)?;
        expansion.powi(power)?;
        quantity.mul_assign(expansion)?;
        did_work = true;
    }
}

/// Reduce a quantity until only primitive tokens remain. Cancellation
/// between numerator and denominator is inherent in the signed-power
/// representation.
pub fn complete_reduce(
    quantity: &mut Quantity,
    scope: &Scope,
) -> Result<(), UnitsError> {
    for _ in 0..MAX_PASSES {
        let numerator = reduce_once(quantity, scope, false)?;
        let denominator = reduce_once(quantity, scope, true)?;
        if !numerator && !denominator {
            return Ok(());
        }
    }
    Err(UnitsError::Reduce)
}

/// Reduce to a pure number. On success the quantity is stripped to its
/// factor; a remaining unit composition is an error.
pub fn as_number(
    quantity: &mut Quantity,
    scope: &Scope,
) -> Result<f64, UnitsError> {
    complete_reduce(quantity, scope)?;
    match quantity.is_number() {
        true => Ok(quantity.factor),
        false => Err(UnitsError::NotANumber),
    }
}

/// True if the reduced quantity carries at most dimensionless primitives,
/// in which case they are dropped from the composition.
pub fn is_dimensionless(quantity: &mut Quantity, scope: &Scope) -> bool {
    let dimensionless = quantity.conformable(&Quantity::one(), |token| {
        scope.symbols().is_dimensionless(token)
    });
    if dimensionless {
        *quantity = Quantity::from_factor(quantity.factor);
    }
    dimensionless
}

/// Take the nth root of a quantity. Every primitive must occur a multiple
/// of n times on its side; dimensionless primitives are exempt and carried
/// through unchanged.
pub fn root(
    quantity: &mut Quantity,
    scope: &Scope,
    n: i32,
) -> Result<(), UnitsError> {
    complete_reduce(quantity, scope)?;
    /* Roots of negative numbers fail in powf(), even odd roots. */
    if quantity.factor < 0.0 {
        return Err(UnitsError::NotRoot);
    }
    let mut out =
        Quantity::from_factor(quantity.factor.powf(1.0 / f64::from(n)));
    for (token, power) in quantity.units() {
        if scope.symbols().is_dimensionless(token) {
            out.push_unit(token, power)?;
        } else if power % n == 0 {
            out.push_unit(token, power / n)?;
        } else {
            return Err(UnitsError::NotRoot);
        }
    }
    *quantity = out;
    Ok(())
}

/// Recover a rational p/q from a float by continued fraction
/// approximation, with a fixed 20-term cutoff.
pub fn float_to_rat(y: f64) -> Option<(i32, i32)> {
    let mut coef = [0i64; 20];
    let mut x = y;
    let mut terms = 0;
    loop {
        coef[terms] = x.floor() as i64;
        let frac = x - x.floor();
        if frac < 0.001 || terms == 19 {
            break;
        }
        x = 1.0 / frac;
        terms += 1;
    }
    let (mut p, mut q) = (0i64, 1i64);
    for i in (1..=terms).rev() {
        let save = q;
        q = coef[i].checked_mul(q)?.checked_add(p)?;
        p = save;
    }
    p = p.checked_add(q.checked_mul(coef[0])?)?;
    (q < MAX_DENOMINATOR && (p as f64 / q as f64 - y).abs() < f64::EPSILON)
        .then_some((p as i32, q as i32))
}

/// Raise a quantity to the power of another quantity. The exponent must
/// reduce to a pure number; a dimensioned base additionally requires a
/// rational exponent.
pub fn unit_power(
    base: &mut Quantity,
    mut exponent: Quantity,
    scope: &Scope,
) -> Result<(), UnitsError> {
    let power = match as_number(&mut exponent, scope) {
        Ok(value) => value,
        Err(UnitsError::NotANumber) => return Err(UnitsError::DimExponent),
        Err(err) => return Err(err),
    };
    match as_number(base, scope) {
        Ok(_) => pow_factor(base, power),
        Err(UnitsError::NotANumber) => match float_to_rat(power) {
            Some((p, q)) => {
                if q != 1 {
                    match root(base, scope, q) {
                        Err(UnitsError::NotRoot) => {
                            return Err(UnitsError::BaseNotRoot)
                        }
                        other => other?,
                    }
                }
                base.powi(p)
            }
            None => match is_dimensionless(base, scope) {
                true => pow_factor(base, power),
                false => Err(UnitsError::IrrationalExponent),
            },
        },
        Err(err) => Err(err),
    }
}

fn pow_factor(base: &mut Quantity, power: f64) -> Result<(), UnitsError> {
    base.factor = base.factor.powf(power);
    match base.factor.is_finite() {
        true => Ok(()),
        false => Err(UnitsError::Math("power out of range")),
    }
}

/// Add a conformable quantity. Both sides are reduced; the compositions
/// must match exactly, dimensionless primitives included, because
/// additive coherence depends on units like the radian.
pub fn add(
    a: &mut Quantity,
    mut b: Quantity,
    scope: &Scope,
) -> Result<(), UnitsError> {
    complete_reduce(a, scope)?;
    complete_reduce(&mut b, scope)?;
    if !a.conformable(&b, |_| false) {
        return Err(UnitsError::BadSum);
    }
    a.factor += b.factor;
    Ok(())
}
