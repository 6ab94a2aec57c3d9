/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use serde::{Deserialize, Serialize};

use super::error::UnitsError;

/// Maximum number precision for formatted output.
pub const MAX_PRECISION: usize = 15;

const FORMAT_TYPES: &str = "gGeEfFaA";
const FORMAT_FLAGS: &str = "+-# 0'";
const DECIMALS: &str = "0123456789.,";

/// Output number format, a printf-style specification restricted to the
/// floating point types. The specification is parsed once and reproduced
/// natively, including `%g` zero-stripping, `%e` two-digit exponents,
/// `%a` hexadecimal floats and the digit-grouping flag.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NumFormat {
    spec: String,
    plus: bool,
    minus: bool,
    alt: bool,
    space: bool,
    zero: bool,
    group: bool,
    width: usize,
    precision: usize,
    explicit_precision: bool,
    type_: char,
}

impl Default for NumFormat {
    fn default() -> Self {
        Self::from_digits(8, 'g')
    }
}

impl NumFormat {
    /// Build a format from a number of significant digits and a format
    /// type, the way the `--digits` option does.
    pub fn from_digits(digits: usize, type_: char) -> Self {
        let digits = digits.min(MAX_PRECISION);
        let precision = match type_ {
            'e' | 'E' => digits.saturating_sub(1),
            _ => digits.max(1),
        };
        NumFormat {
            spec: format!("%.{}{}", precision, type_),
            plus: false,
            minus: false,
            alt: false,
            space: false,
            zero: false,
            group: false,
            width: 0,
            precision,
            explicit_precision: true,
            type_,
        }
    }

    /// Parse and validate a printf-style specification,
    /// `%[flags][width][.precision]type`.
    pub fn parse(spec: &str) -> Result<Self, UnitsError> {
        let bad = |reason: &str| {
            UnitsError::BadFormat(format!("{} ({})", spec, reason))
        };
        let mut rest = spec
            .strip_prefix('%')
            .ok_or_else(|| bad("must start with '%'"))?;
        if rest.contains('%') {
            return Err(bad("only one '%' allowed"));
        }
        if rest.matches('.').count() > 1 {
            return Err(bad("only one '.' allowed"));
        }
        let mut fmt = NumFormat {
            spec: spec.to_string(),
            plus: false,
            minus: false,
            alt: false,
            space: false,
            zero: false,
            group: false,
            width: 0,
            precision: 6,
            explicit_precision: false,
            type_: 'g',
        };
        while let Some(c) = rest.chars().next() {
            if !FORMAT_FLAGS.contains(c) {
                break;
            }
            match c {
                '+' => fmt.plus = true,
                '-' => fmt.minus = true,
                '#' => fmt.alt = true,
                ' ' => fmt.space = true,
                '0' => fmt.zero = true,
                '\'' => fmt.group = true,
                _ => {}
            }
            rest = &rest[1..];
        }
        if let Some(c) = rest.chars().find(|c| "hjLltz".contains(*c)) {
            return Err(bad(&format!(
                "type length modifier ({}) not supported",
                c
            )));
        }
        if let Some(c) = rest
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '.')
        {
            return Err(bad(&format!(
                "invalid character ({}) in width, precision, or type",
                c
            )));
        }
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits > 0 {
            fmt.width = rest[..digits].parse().unwrap_or(0);
            rest = &rest[digits..];
        }
        if let Some(after) = rest.strip_prefix('.') {
            let digits =
                after.chars().take_while(|c| c.is_ascii_digit()).count();
            fmt.precision = match digits {
                0 => 0,
                _ => after[..digits].parse().unwrap_or(0),
            };
            fmt.explicit_precision = true;
            rest = &after[digits..];
        }
        match rest.chars().next() {
            None => return Err(bad("missing format type")),
            Some(c) if FORMAT_TYPES.contains(c) => {
                if rest.len() > 1 {
                    return Err(bad(&format!(
                        "invalid character(s) ({}) after format type",
                        &rest[1..]
                    )));
                }
                fmt.type_ = c;
            }
            Some(c) => {
                return Err(bad(&format!(
                    "invalid format type ({})--valid types are [{}]",
                    c, FORMAT_TYPES
                )))
            }
        }
        if fmt.precision == 0 && matches!(fmt.type_, 'g' | 'G') {
            fmt.precision = 1;
        }
        Ok(fmt)
    }

    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    pub fn type_char(&self) -> char {
        self.type_
    }

    /// Format a number according to the specification.
    pub fn format(&self, value: f64) -> String {
        let upper = self.type_.is_ascii_uppercase();
        if !value.is_finite() {
            let body = match (value.is_nan(), upper) {
                (true, false) => "nan".to_string(),
                (true, true) => "NAN".to_string(),
                (false, false) => "inf".to_string(),
                (false, true) => "INF".to_string(),
            };
            let sign = if value < 0.0 { "-" } else { "" };
            return self.pad(sign, body, false);
        }
        let magnitude = value.abs();
        let body = match self.type_ {
            'f' | 'F' => self.fixed(magnitude),
            'e' | 'E' => self.exponential(magnitude, self.precision, upper),
            'g' | 'G' => self.general(magnitude, upper),
            _ => self.hexadecimal(magnitude, upper),
        };
        let sign = if value.is_sign_negative() {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        };
        self.pad(sign, body, true)
    }

    fn fixed(&self, value: f64) -> String {
        let mut out = format!("{:.*}", self.precision, value);
        if self.alt && self.precision == 0 {
            out.push('.');
        }
        if self.group {
            out = group_thousands(&out);
        }
        out
    }

    fn exponential(
        &self,
        value: f64,
        precision: usize,
        upper: bool,
    ) -> String {
        let raw = format!("{:.*e}", precision, value);
        let (mantissa, exponent) = raw.split_once('e').unwrap();
        let exponent: i32 = exponent.parse().unwrap();
        let mut out = mantissa.to_string();
        if self.alt && precision == 0 {
            out.push('.');
        }
        out.push(if upper { 'E' } else { 'e' });
        out.push_str(&format!("{:+03}", exponent));
        out
    }

    fn general(&self, value: f64, upper: bool) -> String {
        let p = self.precision.max(1);
        let probe = format!("{:.*e}", p - 1, value);
        let exponent: i32 = probe.split_once('e').unwrap().1.parse().unwrap();
        if exponent < -4 || exponent >= p as i32 {
            let mut out = self.exponential(value, p - 1, upper);
            if !self.alt {
                out = strip_zeros_exp(&out);
            }
            out
        } else {
            let decimals = (p as i32 - 1 - exponent).max(0) as usize;
            let mut out = format!("{:.*}", decimals, value);
            if !self.alt && out.contains('.') {
                out = out.trim_end_matches('0').trim_end_matches('.').into();
            }
            if self.group {
                out = group_thousands(&out);
            }
            out
        }
    }

    fn hexadecimal(&self, value: f64, upper: bool) -> String {
        let precision = match self.explicit_precision {
            true => Some(self.precision),
            false => None,
        };
        let mut out = hex_float(value, precision);
        if upper {
            out = out.to_uppercase();
        }
        out
    }

    fn pad(&self, sign: &str, body: String, zero_ok: bool) -> String {
        let len = sign.chars().count() + body.chars().count();
        if len >= self.width {
            return format!("{}{}", sign, body);
        }
        let fill = self.width - len;
        if self.minus {
            format!("{}{}{}", sign, body, " ".repeat(fill))
        } else if self.zero && zero_ok {
            format!("{}{}{}", sign, "0".repeat(fill), body)
        } else {
            format!("{}{}{}", " ".repeat(fill), sign, body)
        }
    }

    /// True if the value formats to the same text as the reference value
    /// parses from. Used to decide whether a multiplier of one can be
    /// elided.
    pub fn displays_as(&self, reference: f64, value: f64) -> bool {
        self.displays_with(reference, value).0
    }

    /// As `displays_as`, also reporting whether the formatted output
    /// contained any character other than a plain digit.
    pub fn displays_with(&self, reference: f64, value: f64) -> (bool, bool) {
        if !value.is_finite() {
            return (false, true);
        }
        let buf = self.format(value);
        let nondigits = buf.chars().any(|c| !c.is_ascii_digit());
        let rounded = scan_double(&buf).map_or(0.0, |(v, _)| v);
        (rounded == reference, nondigits)
    }

    /// Format and reparse, yielding the value the user will actually see.
    pub fn round_to_displayed(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return value;
        }
        scan_double(&self.format(value)).map_or(0.0, |(v, _)| v)
    }

    /// Print a unit with its multiplier and any necessary punctuation.
    /// Elides a multiplier that displays as one when the unit literal
    /// already begins with a digit, folds `1|x` fractions into the
    /// multiplier, and parenthesises sums and differences.
    pub fn show_with_unit(
        &self,
        value: f64,
        unitstr: &str,
        print_num: bool,
        show_factor: bool,
    ) -> String {
        let (is_one, has_nondigits) = self.displays_with(1.0, value);
        let starts_decimal = unitstr
            .chars()
            .next()
            .map_or(false, |c| DECIMALS.contains(c));
        let mut out = String::new();
        if print_num && !(is_one && starts_decimal) {
            out.push_str(&self.format(value));
        }
        if unitstr.contains('+') || unitstr.contains('-') {
            out.push_str(&format!(" ({})", unitstr));
        } else if print_num
            && !show_factor
            && unitstr.starts_with("1|")
            && is_fraction(unitstr)
            && !is_one
            && !has_nondigits
        {
            out.push_str(&unitstr[1..]);
        } else if is_one && starts_decimal {
            out.push_str(unitstr);
        } else if starts_decimal {
            out.push_str(&format!(" * {}", unitstr));
        } else {
            out.push_str(&format!(" {}", unitstr));
        }
        out
    }
}

fn strip_zeros_exp(formatted: &str) -> String {
    match formatted.split_once(|c| c == 'e' || c == 'E') {
        Some((mantissa, exponent)) if mantissa.contains('.') => {
            let e = if formatted.contains('E') { 'E' } else { 'e' };
            format!(
                "{}{}{}",
                mantissa.trim_end_matches('0').trim_end_matches('.'),
                e,
                exponent
            )
        }
        _ => formatted.to_string(),
    }
}

fn group_thousands(formatted: &str) -> String {
    let (int, rest) = match formatted.find('.') {
        Some(pos) => formatted.split_at(pos),
        None => (formatted, ""),
    };
    let digits: Vec<char> = int.chars().collect();
    let mut out = String::new();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(*c);
    }
    out.push_str(rest);
    out
}

/// C99 hexadecimal floating point representation. Without a precision the
/// mantissa is printed exactly with trailing zeros removed; with one it is
/// rounded to that many hex digits.
fn hex_float(value: f64, precision: Option<usize>) -> String {
    let bits = value.to_bits() & !(1u64 << 63);
    let raw_exp = ((bits >> 52) & 0x7ff) as i32;
    let mantissa = bits & ((1u64 << 52) - 1);
    let (lead, mut mant, exp) = match raw_exp {
        0 if mantissa == 0 => (0u64, 0u64, 0),
        0 => (0, mantissa, -1022),
        _ => (1, mantissa, raw_exp - 1023),
    };
    let lead = match precision {
        Some(p) if p < 13 => {
            /* Round lead and mantissa together to p hex digits, half to
             * even; the carry may grow the lead digit. */
            let shift = 4 * (13 - p);
            let full = (lead << 52) | mant;
            let keep = full >> shift;
            let rem = full & ((1u64 << shift) - 1);
            let half = 1u64 << (shift - 1);
            let rounded = match rem.cmp(&half) {
                std::cmp::Ordering::Greater => keep + 1,
                std::cmp::Ordering::Equal => keep + (keep & 1),
                std::cmp::Ordering::Less => keep,
            };
            let full = rounded << shift;
            mant = full & ((1u64 << 52) - 1);
            full >> 52
        }
        _ => lead,
    };
    let mut digits = String::new();
    for i in 0..13 {
        let nibble = (mant >> (48 - 4 * i)) & 0xf;
        digits.push(char::from_digit(nibble as u32, 16).unwrap());
    }
    match precision {
        Some(p) => {
            if p < 13 {
                digits.truncate(p);
            } else {
                digits.push_str(&"0".repeat(p - 13));
            }
        }
        None => {
            while digits.ends_with('0') {
                digits.pop();
            }
        }
    }
    match digits.is_empty() {
        true => format!("0x{}p{:+}", lead, exp),
        false => format!("0x{}.{}p{:+}", lead, digits, exp),
    }
}

/// True for strings of the form `N|M` with integer M (a fraction literal
/// whose denominator carries no decimal point or exponent).
pub fn is_fraction(unitstr: &str) -> bool {
    let rest = unitstr.trim_start_matches(|c: char| c.is_ascii_digit());
    match rest.strip_prefix('|') {
        Some(denom) => {
            let int_len =
                denom.chars().take_while(|c| c.is_ascii_digit()).count();
            match scan_double(denom) {
                Some((_, len)) => len == int_len && int_len > 0,
                None => false,
            }
        }
        None => false,
    }
}

/// Determine the number of significant digits remaining in a remainder
/// relative to an original value assumed to carry full double precision.
/// The base must be 2 or 10.
pub fn getsigdigits(original: f64, remainder: f64, base: u32) -> i32 {
    let (max_digits, log): (f64, fn(f64) -> f64) = match base {
        2 => (f64::MANTISSA_DIGITS as f64, f64::log2),
        _ => (f64::MANTISSA_DIGITS as f64 * 2f64.log10(), f64::log10),
    };
    if original == 0.0 {
        return max_digits.floor() as i32;
    }
    if remainder == 0.0 {
        return 0;
    }
    let sigdigits = (max_digits - log((original / remainder).abs())).floor();
    (sigdigits as i32).max(0)
}

/// Round a value to the given number of binary or decimal digits.
pub fn round_digits(value: f64, digits: i32, base: u32) -> f64 {
    if digits == 0 {
        return 0.0;
    }
    let log: fn(f64) -> f64 = match base {
        2 => f64::log2,
        _ => f64::log10,
    };
    let mut digits = digits;
    if value != 0.0 {
        digits -= log(value.abs()).ceil() as i32;
    }
    let mult = (base as f64).powi(digits);
    (value * mult).round() / mult
}

/// Parse the longest valid floating point prefix of a string, the way
/// `strtod` does. Returns the value and the number of bytes consumed.
pub fn scan_double(input: &str) -> Option<(f64, usize)> {
    let bytes = input.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() && (bytes[pos] as char).is_whitespace() {
        pos += 1;
    }
    let start = pos;
    if pos < bytes.len() && (bytes[pos] == b'+' || bytes[pos] == b'-') {
        pos += 1;
    }
    let lower = input[pos..].to_ascii_lowercase();
    for special in ["infinity", "inf", "nan"] {
        if lower.starts_with(special) {
            let end = pos + special.len();
            let value: f64 = input[start..end].parse().ok()?;
            return Some((value, end));
        }
    }
    let int_digits = count_digits(&bytes[pos..]);
    pos += int_digits;
    let mut frac_digits = 0;
    if pos < bytes.len() && bytes[pos] == b'.' {
        frac_digits = count_digits(&bytes[pos + 1..]);
        if int_digits > 0 || frac_digits > 0 {
            pos += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }
    let mut end = pos;
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut expos = pos + 1;
        if expos < bytes.len() && (bytes[expos] == b'+' || bytes[expos] == b'-')
        {
            expos += 1;
        }
        let exp_digits = count_digits(&bytes[expos..]);
        if exp_digits > 0 {
            end = expos + exp_digits;
        }
    }
    let value: f64 = input[start..end].parse().ok()?;
    Some((value, end))
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}
