//! Physical units attached to the scalars we derive.
//!
//! A [`Unit`] keeps the expression it was written with (`kpc**3/(Msun*s**2)`),
//! its CGS conversion factor and its dimension exponents. Units are obtained
//! from a [`UnitRegistry`], which knows the base symbols and can be extended
//! with simulation-specific ones (RAMSES code units, comoving lengths).

use failure::Fail;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Div, Mul};

pub const MSUN_IN_G: f64 = 1.98841586e33;
pub const PC_IN_CM: f64 = 3.0856775809623245e18;
pub const AU_IN_CM: f64 = 1.495978707e13;
// julian year
pub const YEAR_IN_S: f64 = 31_557_600.0;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub mass: i32,
    pub length: i32,
    pub time: i32,
    pub temperature: i32,
}

impl Dimensions {
    pub const DIMENSIONLESS: Dimensions = Dimensions {
        mass: 0,
        length: 0,
        time: 0,
        temperature: 0,
    };
    pub const MASS: Dimensions = Dimensions {
        mass: 1,
        ..Dimensions::DIMENSIONLESS
    };
    pub const LENGTH: Dimensions = Dimensions {
        length: 1,
        ..Dimensions::DIMENSIONLESS
    };
    pub const TIME: Dimensions = Dimensions {
        time: 1,
        ..Dimensions::DIMENSIONLESS
    };
    pub const TEMPERATURE: Dimensions = Dimensions {
        temperature: 1,
        ..Dimensions::DIMENSIONLESS
    };

    pub fn is_dimensionless(&self) -> bool {
        *self == Dimensions::DIMENSIONLESS
    }

    pub fn powi(self, n: i32) -> Dimensions {
        Dimensions {
            mass: self.mass * n,
            length: self.length * n,
            time: self.time * n,
            temperature: self.temperature * n,
        }
    }

    fn combine(self, other: Dimensions, sign: i32) -> Dimensions {
        Dimensions {
            mass: self.mass + sign * other.mass,
            length: self.length + sign * other.length,
            time: self.time + sign * other.time,
            temperature: self.temperature + sign * other.temperature,
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "M^{} L^{} T^{} K^{}",
            self.mass, self.length, self.time, self.temperature
        )
    }
}

#[derive(Debug, Fail, Clone, PartialEq)]
pub enum UnitError {
    #[fail(display = "unknown unit symbol '{}'", _0)]
    UnknownSymbol(String),
    #[fail(display = "invalid unit expression '{}': {}", _0, _1)]
    Syntax(String, String),
    #[fail(
        display = "cannot convert '{}' ({}) to '{}' ({})",
        _0, _1, _2, _3
    )]
    Incompatible(String, Dimensions, String, Dimensions),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    symbol: String,
    factor: f64,
    dimensions: Dimensions,
}

impl Unit {
    pub fn new(symbol: impl Into<String>, factor: f64, dimensions: Dimensions) -> Unit {
        Unit {
            symbol: symbol.into(),
            factor,
            dimensions,
        }
    }

    pub fn dimensionless() -> Unit {
        Unit::new("dimensionless", 1.0, Dimensions::DIMENSIONLESS)
    }

    /// The expression this unit is written with, it can be parsed back by
    /// any registry knowing the same symbols.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Value of one of this unit in CGS.
    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.dimensions == other.dimensions
    }

    /// Factor to multiply a value in `self` by to express it in `target`.
    pub fn conversion_factor(&self, target: &Unit) -> Result<f64, UnitError> {
        if !self.is_compatible(target) {
            return Err(UnitError::Incompatible(
                self.symbol.clone(),
                self.dimensions,
                target.symbol.clone(),
                target.dimensions,
            ));
        }
        Ok(self.factor / target.factor)
    }

    pub fn powi(&self, n: i32) -> Unit {
        Unit {
            symbol: format!("{}**{}", grouped(&self.symbol), n),
            factor: self.factor.powi(n),
            dimensions: self.dimensions.powi(n),
        }
    }
}

// wraps composite expressions so they can be embedded in another one
fn grouped(symbol: &str) -> String {
    if symbol.contains(|c| c == '*' || c == '/') {
        format!("({})", symbol)
    } else {
        symbol.to_string()
    }
}

impl<'a> Mul<&'a Unit> for &'a Unit {
    type Output = Unit;
    fn mul(self, rhs: &Unit) -> Unit {
        Unit {
            symbol: format!("{}*{}", grouped(&self.symbol), grouped(&rhs.symbol)),
            factor: self.factor * rhs.factor,
            dimensions: self.dimensions.combine(rhs.dimensions, 1),
        }
    }
}

impl<'a> Div<&'a Unit> for &'a Unit {
    type Output = Unit;
    fn div(self, rhs: &Unit) -> Unit {
        Unit {
            symbol: format!("{}/{}", grouped(&self.symbol), grouped(&rhs.symbol)),
            factor: self.factor / rhs.factor,
            dimensions: self.dimensions.combine(rhs.dimensions, -1),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

/// A value together with the unit it is expressed in.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    value: f64,
    unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Quantity {
        Quantity { value, unit }
    }

    pub fn dimensionless(value: f64) -> Quantity {
        Quantity::new(value, Unit::dimensionless())
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn to(&self, target: &Unit) -> Result<Quantity, UnitError> {
        let factor = self.unit.conversion_factor(target)?;
        Ok(Quantity::new(self.value * factor, target.clone()))
    }

    pub fn in_units(&self, registry: &UnitRegistry, expr: &str) -> Result<Quantity, UnitError> {
        self.to(&registry.parse(expr)?)
    }

    pub fn powi(&self, n: i32) -> Quantity {
        Quantity::new(self.value.powi(n), self.unit.powi(n))
    }
}

impl Mul<f64> for Quantity {
    type Output = Quantity;
    fn mul(self, rhs: f64) -> Quantity {
        Quantity::new(self.value * rhs, self.unit)
    }
}

impl<'a> Mul<&'a Quantity> for &'a Quantity {
    type Output = Quantity;
    fn mul(self, rhs: &Quantity) -> Quantity {
        Quantity::new(self.value * rhs.value, &self.unit * &rhs.unit)
    }
}

impl<'a> Div<&'a Quantity> for &'a Quantity {
    type Output = Quantity;
    fn div(self, rhs: &Quantity) -> Quantity {
        Quantity::new(self.value / rhs.value, &self.unit / &rhs.unit)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

static BASE_SYMBOLS: [(&str, f64, Dimensions); 20] = [
    ("dimensionless", 1.0, Dimensions::DIMENSIONLESS),
    ("g", 1.0, Dimensions::MASS),
    ("kg", 1.0e3, Dimensions::MASS),
    ("Msun", MSUN_IN_G, Dimensions::MASS),
    ("cm", 1.0, Dimensions::LENGTH),
    ("m", 1.0e2, Dimensions::LENGTH),
    ("km", 1.0e5, Dimensions::LENGTH),
    ("AU", AU_IN_CM, Dimensions::LENGTH),
    ("pc", PC_IN_CM, Dimensions::LENGTH),
    ("kpc", PC_IN_CM * 1.0e3, Dimensions::LENGTH),
    ("Mpc", PC_IN_CM * 1.0e6, Dimensions::LENGTH),
    ("s", 1.0, Dimensions::TIME),
    ("min", 60.0, Dimensions::TIME),
    ("hr", 3600.0, Dimensions::TIME),
    ("day", 86400.0, Dimensions::TIME),
    ("yr", YEAR_IN_S, Dimensions::TIME),
    ("Myr", YEAR_IN_S * 1.0e6, Dimensions::TIME),
    ("Gyr", YEAR_IN_S * 1.0e9, Dimensions::TIME),
    ("K", 1.0, Dimensions::TEMPERATURE),
    ("erg", 1.0, Dimensions {
        mass: 1,
        length: 2,
        time: -2,
        temperature: 0,
    }),
];

// lengths that get a comoving "<symbol>cm" twin
static COMOVING_LENGTHS: [&str; 4] = ["cm", "pc", "kpc", "Mpc"];

/// Symbol table used to resolve unit expressions.
#[derive(Debug, Clone)]
pub struct UnitRegistry {
    symbols: BTreeMap<String, (f64, Dimensions)>,
}

impl Default for UnitRegistry {
    fn default() -> Self {
        let mut registry = UnitRegistry {
            symbols: BTreeMap::new(),
        };
        for &(symbol, factor, dims) in BASE_SYMBOLS.iter() {
            registry.register(symbol, factor, dims);
        }
        registry.set_scale_factor(1.0);
        registry
    }
}

impl UnitRegistry {
    pub fn with_scale_factor(scale_factor: f64) -> UnitRegistry {
        let mut registry = UnitRegistry::default();
        registry.set_scale_factor(scale_factor);
        registry
    }

    /// (Re)defines the comoving lengths (`kpccm`, `Mpccm`, ...) for the
    /// given scale factor.
    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        for length in COMOVING_LENGTHS.iter() {
            let (factor, dims) = self.symbols[*length];
            self.register(format!("{}cm", length), factor * scale_factor, dims);
        }
    }

    pub fn register(&mut self, symbol: impl Into<String>, factor: f64, dimensions: Dimensions) {
        self.symbols.insert(symbol.into(), (factor, dimensions));
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains_key(symbol)
    }

    pub fn lookup(&self, symbol: &str) -> Result<Unit, UnitError> {
        self.symbols
            .get(symbol)
            .map(|&(factor, dims)| Unit::new(symbol, factor, dims))
            .ok_or_else(|| UnitError::UnknownSymbol(symbol.to_string()))
    }

    /// Parses an expression such as `kpc**3/(Msun*s**2)` or `1/s`.
    /// An empty expression is dimensionless.
    pub fn parse(&self, expr: &str) -> Result<Unit, UnitError> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Ok(Unit::dimensionless());
        }
        let tokens = tokenize(expr)?;
        let mut parser = Parser {
            input: expr,
            tokens: &tokens,
            pos: 0,
            registry: self,
        };
        let (factor, dims) = parser.expr()?;
        if parser.pos != tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(Unit::new(expr, factor, dims))
    }

    pub fn quantity(&self, value: f64, expr: &str) -> Result<Quantity, UnitError> {
        Ok(Quantity::new(value, self.parse(expr)?))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Symbol(String),
    Number(f64),
    Star,
    Slash,
    Pow,
    Minus,
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>, UnitError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = vec![];
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Pow);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Pow);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() {
                    let d = chars[i];
                    let exponent_sign =
                        (d == '+' || d == '-') && i > start && (chars[i - 1] == 'e' || chars[i - 1] == 'E');
                    if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exponent_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let number = text.parse::<f64>().map_err(|_| {
                    UnitError::Syntax(input.to_string(), format!("invalid number '{}'", text))
                })?;
                tokens.push(Token::Number(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Symbol(chars[start..i].iter().collect()));
            }
            c => {
                return Err(UnitError::Syntax(
                    input.to_string(),
                    format!("unexpected character '{}'", c),
                ))
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    input: &'a str,
    tokens: &'a [Token],
    pos: usize,
    registry: &'a UnitRegistry,
}

impl<'a> Parser<'a> {
    fn error(&self, msg: &str) -> UnitError {
        UnitError::Syntax(self.input.to_string(), msg.to_string())
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let t = self.tokens.get(self.pos);
        self.pos += 1;
        t
    }

    fn expr(&mut self) -> Result<(f64, Dimensions), UnitError> {
        let (mut factor, mut dims) = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    let (f, d) = self.term()?;
                    factor *= f;
                    dims = dims.combine(d, 1);
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let (f, d) = self.term()?;
                    factor /= f;
                    dims = dims.combine(d, -1);
                }
                _ => return Ok((factor, dims)),
            }
        }
    }

    fn term(&mut self) -> Result<(f64, Dimensions), UnitError> {
        let (factor, dims) = self.atom()?;
        if self.peek() != Some(&Token::Pow) {
            return Ok((factor, dims));
        }
        self.pos += 1;
        let exponent = self.exponent()?;
        Ok((factor.powi(exponent), dims.powi(exponent)))
    }

    fn exponent(&mut self) -> Result<i32, UnitError> {
        let negative = if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            true
        } else {
            false
        };
        match self.next() {
            Some(Token::Number(n)) if n.fract() == 0.0 && n.abs() <= i32::MAX as f64 => {
                let n = *n as i32;
                Ok(if negative { -n } else { n })
            }
            Some(Token::Number(n)) if n.fract() == 0.0 => Err(self.error("exponent out of range")),
            Some(Token::Number(_)) => Err(self.error("only integer exponents are supported")),
            _ => Err(self.error("expected an exponent")),
        }
    }

    fn atom(&mut self) -> Result<(f64, Dimensions), UnitError> {
        match self.next() {
            Some(Token::Symbol(s)) => {
                let unit = self.registry.lookup(s)?;
                Ok((unit.factor(), unit.dimensions()))
            }
            Some(Token::Number(n)) => Ok((*n, Dimensions::DIMENSIONLESS)),
            Some(Token::Open) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(self.error("unbalanced parenthesis")),
                }
            }
            _ => Err(self.error("expected a unit symbol")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn parse_simple_symbol() {
        let registry = UnitRegistry::default();
        let kpc = registry.parse("kpc").unwrap();
        assert_eq!(kpc.symbol(), "kpc");
        assert_eq!(kpc.dimensions(), Dimensions::LENGTH);
        assert_relative_eq!(kpc.factor(), 3.0856775809623245e21);
    }

    #[test]
    fn parse_compound_expression() {
        let registry = UnitRegistry::default();
        let g_unit = registry.parse("kpc**3/(Msun*s**2)").unwrap();
        assert_eq!(
            g_unit.dimensions(),
            Dimensions {
                mass: -1,
                length: 3,
                time: -2,
                temperature: 0
            }
        );
        assert_relative_eq!(
            g_unit.factor(),
            (PC_IN_CM * 1.0e3).powi(3) / MSUN_IN_G,
            max_relative = 1e-12
        );

        let per_second = registry.parse("1/s").unwrap();
        assert_eq!(per_second.dimensions().time, -1);
        assert_eq!(per_second.factor(), 1.0);

        let with_caret = registry.parse("Msun / kpc^3").unwrap();
        let with_pow = registry.parse("Msun/kpc**3").unwrap();
        assert!(with_caret.is_compatible(&with_pow));
        assert_relative_eq!(with_caret.factor(), with_pow.factor());

        let negative = registry.parse("cm*s**-1").unwrap();
        assert_eq!(negative.dimensions().time, -1);
    }

    #[test]
    fn parse_errors() {
        let registry = UnitRegistry::default();
        assert_eq!(
            registry.parse("parsec").unwrap_err(),
            UnitError::UnknownSymbol("parsec".into())
        );
        assert!(matches!(
            registry.parse("kpc**0.5"),
            Err(UnitError::Syntax(..))
        ));
        assert!(matches!(registry.parse("(kpc"), Err(UnitError::Syntax(..))));
        assert!(matches!(registry.parse("kpc$"), Err(UnitError::Syntax(..))));
        assert!(matches!(registry.parse("kpc s"), Err(UnitError::Syntax(..))));
    }

    #[test]
    fn huge_exponents_are_rejected() {
        let registry = UnitRegistry::default();
        match registry.parse("kpc**1e10") {
            Err(UnitError::Syntax(expr, msg)) => {
                assert_eq!(expr, "kpc**1e10");
                assert_eq!(msg, "exponent out of range");
            }
            r => panic!("unexpected result {:?}", r),
        }
        assert!(matches!(registry.parse("s**-1e10"), Err(UnitError::Syntax(..))));
        assert_eq!(registry.parse("kpc**2").unwrap().dimensions(), Dimensions::LENGTH.powi(2));
    }

    #[test]
    fn empty_expression_is_dimensionless() {
        let registry = UnitRegistry::default();
        assert_eq!(registry.parse("  ").unwrap(), Unit::dimensionless());
    }

    #[test]
    fn comoving_lengths_follow_scale_factor() {
        let registry = UnitRegistry::with_scale_factor(0.5);
        let box_size = registry.quantity(100.0, "Mpccm").unwrap();
        let physical = box_size.in_units(&registry, "Mpc").unwrap();
        assert_relative_eq!(physical.value(), 50.0, max_relative = 1e-12);
        assert_eq!(physical.unit().symbol(), "Mpc");
    }

    #[test]
    fn conversion_between_incompatible_units_fails() {
        let registry = UnitRegistry::default();
        let t = registry.quantity(1.0, "Gyr").unwrap();
        assert!(matches!(
            t.in_units(&registry, "kpc"),
            Err(UnitError::Incompatible(..))
        ));
        let myr = t.in_units(&registry, "Myr").unwrap();
        assert_relative_eq!(myr.value(), 1000.0, max_relative = 1e-12);
    }

    #[test]
    fn unit_algebra_reduces_dimensions() {
        let registry = UnitRegistry::default();
        let h = registry.quantity(2.0, "1/s").unwrap();
        let g = registry.quantity(4.0, "kpc**3/(Msun*s**2)").unwrap();
        let ratio = &h.powi(2) / &g;
        assert_eq!(ratio.value(), 1.0);
        assert_eq!(
            ratio.unit().dimensions(),
            Dimensions {
                mass: 1,
                length: -3,
                time: 0,
                temperature: 0
            }
        );
        // the composed symbol stays parseable
        let reparsed = registry.parse(ratio.unit().symbol()).unwrap();
        assert_relative_eq!(reparsed.factor(), ratio.unit().factor(), max_relative = 1e-12);
        let density = ratio.in_units(&registry, "Msun/kpc**3").unwrap();
        assert_relative_eq!(density.value(), 1.0, max_relative = 1e-12);
    }

    #[test]
    fn registered_code_units() {
        let mut registry = UnitRegistry::default();
        registry.register("code_length", 2.0e24, Dimensions::LENGTH);
        assert!(registry.contains("code_length"));
        let l = registry.quantity(0.5, "code_length").unwrap();
        assert_relative_eq!(l.in_units(&registry, "cm").unwrap().value(), 1.0e24);
    }
}
