use crate::core::config::FormatConfig;
use crate::math::complex::Complex;
use crate::math::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct NumberFormat {
    pub precision: usize,
    pub grouping: bool,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self::from(&FormatConfig::default())
    }
}

impl From<&FormatConfig> for NumberFormat {
    fn from(config: &FormatConfig) -> Self {
        Self {
            precision: config.precision.min(15),
            grouping: config.grouping,
        }
    }
}

impl NumberFormat {
    pub fn number(&self, value: f64) -> String {
        if value.is_nan() {
            return "NaN".to_string();
        }
        if value.is_infinite() {
            return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
        }

        let magnitude = value.abs();
        if magnitude >= 1e21 || (magnitude != 0.0 && magnitude < 1e-6) {
            return self.exponential(value);
        }

        let fixed = format!("{:.*}", self.precision, value);
        let trimmed = if fixed.contains('.') {
            fixed.trim_end_matches('0').trim_end_matches('.')
        } else {
            fixed.as_str()
        };
        let (sign, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", trimmed),
        };
        let (integer, fraction) = match digits.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (digits, None),
        };
        if integer == "0" && fraction.is_none() {
            return "0".to_string();
        }

        let integer = if self.grouping {
            group_thousands(integer)
        } else {
            integer.to_string()
        };
        match fraction {
            Some(fraction) => format!("{sign}{integer}.{fraction}"),
            None => format!("{sign}{integer}"),
        }
    }

    fn exponential(&self, value: f64) -> String {
        let text = format!("{:.*e}", self.precision, value);
        let (mantissa, exponent) = text.split_once('e').unwrap_or((text.as_str(), "0"));
        let mantissa = if mantissa.contains('.') {
            mantissa.trim_end_matches('0').trim_end_matches('.')
        } else {
            mantissa
        };
        let exponent = match exponent.strip_prefix('-') {
            Some(digits) => format!("-{digits}"),
            None => format!("+{exponent}"),
        };
        format!("{mantissa}e{exponent}")
    }

    pub fn complex(&self, c: Complex) -> String {
        if c.im == 0.0 {
            return self.number(c.re);
        }
        let im = if c.im.abs() == 1.0 {
            String::new()
        } else {
            self.number(c.im.abs())
        };
        if c.re == 0.0 {
            let sign = if c.im < 0.0 { "-" } else { "" };
            return format!("{sign}{im}i");
        }
        let op = if c.im < 0.0 { "-" } else { "+" };
        format!("{} {op} {im}i", self.number(c.re))
    }

    pub fn value(&self, value: &Value) -> String {
        match value {
            Value::Number(n) => self.number(*n),
            Value::Complex(c) => self.complex(*c),
            Value::Quantity(q) => {
                if q.unit.is_empty() {
                    self.number(q.value)
                } else {
                    format!("{} {}", self.number(q.value), q.unit)
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::Function(f) => format!("{}({})", f.name, f.params.join(", ")),
        }
    }
}

fn group_thousands(integer: &str) -> String {
    let mut out = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::value::{Function, Quantity, Unit};

    #[test]
    fn test_number_formatting() {
        let format = NumberFormat::default();
        assert_eq!(format.number(12.0), "12");
        assert_eq!(format.number(3.4641016151377544), "3.464102");
        assert_eq!(format.number(1234567.5), "1,234,567.5");
        assert_eq!(format.number(-0.0000001), "-1e-7");
        assert_eq!(format.number(-0.0), "0");
        assert_eq!(format.number(2e21), "2e+21");
        assert_eq!(format.number(f64::INFINITY), "Infinity");
    }

    #[test]
    fn test_grouping_can_be_disabled() {
        let format = NumberFormat {
            precision: 2,
            grouping: false,
        };
        assert_eq!(format.number(1234567.891), "1234567.89");
    }

    #[test]
    fn test_complex_formatting() {
        let format = NumberFormat::default();
        assert_eq!(format.complex(Complex::new(0.0, 2.0)), "2i");
        assert_eq!(format.complex(Complex::new(1.0, -1.0)), "1 - i");
        assert_eq!(format.complex(Complex::new(3.0, 0.0)), "3");
    }

    #[test]
    fn test_value_formatting() {
        let format = NumberFormat::default();
        let qty = Value::Quantity(Quantity {
            value: 1500.0,
            unit: Unit::single("EUR"),
        });
        assert_eq!(format.value(&qty), "1,500 EUR");
        let f = Value::Function(Function {
            name: "f".to_string(),
            params: vec!["x".to_string()],
            body: "x ^ 2".to_string(),
        });
        assert_eq!(format.value(&f), "f(x)");
    }
}
