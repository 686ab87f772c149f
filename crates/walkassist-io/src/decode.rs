// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Value decoders: raw OSC argument list + declared value type -> typed reading.

use crate::core::{DecodeError, TypedReading};
use rosc::OscType;
use walkassist_config::ValueType;

/// Decode `args` as `value_type`.
///
/// Scalars take exactly one argument and coerce it to the declared
/// representation. Vectors take exactly N numeric arguments, assigned to
/// `x, y[, z[, w]]` in order.
pub fn decode(value_type: ValueType, args: &[OscType]) -> Result<TypedReading, DecodeError> {
    let expected = value_type.arity();
    if args.len() != expected {
        return Err(DecodeError::Arity {
            value_type,
            expected,
            actual: args.len(),
        });
    }

    let invalid = |index: usize| DecodeError::InvalidArgument {
        value_type,
        index,
        found: describe(&args[index]),
    };

    match value_type {
        ValueType::Float => decode_float(&args[0])
            .map(TypedReading::Float)
            .ok_or_else(|| invalid(0)),
        ValueType::Int => decode_int(&args[0])
            .map(TypedReading::Int)
            .ok_or_else(|| invalid(0)),
        ValueType::Bool => decode_bool(&args[0])
            .map(TypedReading::Bool)
            .ok_or_else(|| invalid(0)),
        ValueType::String => decode_text(&args[0])
            .map(TypedReading::Text)
            .ok_or_else(|| invalid(0)),
        ValueType::Vector2 => {
            let v = decode_vector::<2>(args).map_err(invalid)?;
            Ok(TypedReading::Vector2(v))
        }
        ValueType::Vector3 => {
            let v = decode_vector::<3>(args).map_err(invalid)?;
            Ok(TypedReading::Vector3(v))
        }
        ValueType::Vector4 => {
            let v = decode_vector::<4>(args).map_err(invalid)?;
            Ok(TypedReading::Vector4(v))
        }
    }
}

/// Numeric argument as f64; non-numeric kinds yield `None`
pub fn numeric(arg: &OscType) -> Option<f64> {
    match arg {
        OscType::Float(v) => Some(f64::from(*v)),
        OscType::Double(v) => Some(*v),
        OscType::Int(v) => Some(f64::from(*v)),
        OscType::Long(v) => Some(*v as f64),
        _ => None,
    }
}

/// Returns the index of the first non-numeric or non-finite argument on failure
fn decode_vector<const N: usize>(args: &[OscType]) -> Result<[f64; N], usize> {
    let mut values = [0.0; N];
    for (index, (slot, arg)) in values.iter_mut().zip(args).enumerate() {
        *slot = numeric(arg).filter(|v| v.is_finite()).ok_or(index)?;
    }
    Ok(values)
}

fn decode_float(arg: &OscType) -> Option<f64> {
    let value = match arg {
        OscType::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
        OscType::String(s) => s.trim().parse::<f64>().ok(),
        other => numeric(other),
    };
    value.filter(|v| v.is_finite())
}

fn decode_int(arg: &OscType) -> Option<i64> {
    match arg {
        OscType::Int(v) => Some(i64::from(*v)),
        OscType::Long(v) => Some(*v),
        OscType::Float(v) if v.is_finite() => Some(v.trunc() as i64),
        OscType::Double(v) if v.is_finite() => Some(v.trunc() as i64),
        OscType::Bool(v) => Some(i64::from(*v)),
        OscType::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(|v| v.trunc() as i64)
            })
        }
        _ => None,
    }
}

fn decode_bool(arg: &OscType) -> Option<bool> {
    match arg {
        OscType::Bool(v) => Some(*v),
        OscType::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        other => numeric(other).map(|v| v != 0.0),
    }
}

fn decode_text(arg: &OscType) -> Option<String> {
    match arg {
        OscType::String(s) => Some(s.clone()),
        OscType::Char(c) => Some(c.to_string()),
        OscType::Bool(v) => Some(v.to_string()),
        OscType::Int(v) => Some(v.to_string()),
        OscType::Long(v) => Some(v.to_string()),
        OscType::Float(v) => Some(v.to_string()),
        OscType::Double(v) => Some(v.to_string()),
        _ => None,
    }
}

fn describe(arg: &OscType) -> String {
    match arg {
        OscType::String(s) => format!("string {:?}", s),
        OscType::Blob(b) => format!("blob of {} bytes", b.len()),
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_coercion() {
        assert_eq!(
            decode(ValueType::Float, &[OscType::Int(3)]).unwrap(),
            TypedReading::Float(3.0)
        );
        assert_eq!(
            decode(ValueType::Int, &[OscType::Float(7.9)]).unwrap(),
            TypedReading::Int(7)
        );
        assert_eq!(
            decode(ValueType::Int, &[OscType::String("42".into())]).unwrap(),
            TypedReading::Int(42)
        );
        assert_eq!(
            decode(ValueType::Bool, &[OscType::Float(0.0)]).unwrap(),
            TypedReading::Bool(false)
        );
        assert_eq!(
            decode(ValueType::Bool, &[OscType::String("True".into())]).unwrap(),
            TypedReading::Bool(true)
        );
        assert_eq!(
            decode(ValueType::String, &[OscType::Int(5)]).unwrap(),
            TypedReading::Text("5".to_string())
        );
    }

    #[test]
    fn test_vector_positional_assignment() {
        let args = [OscType::Float(1.5), OscType::Int(-2), OscType::Double(0.25)];
        assert_eq!(
            decode(ValueType::Vector3, &args).unwrap(),
            TypedReading::Vector3([1.5, -2.0, 0.25])
        );

        let args = [
            OscType::Long(1),
            OscType::Long(2),
            OscType::Long(3),
            OscType::Long(4),
        ];
        let reading = decode(ValueType::Vector4, &args).unwrap();
        assert_eq!(reading.components().len(), 4);
    }

    #[test]
    fn test_arity_mismatch_fails() {
        for value_type in ValueType::ALL {
            let too_many = vec![OscType::Float(1.0); value_type.arity() + 1];
            assert!(matches!(
                decode(value_type, &too_many),
                Err(DecodeError::Arity { .. })
            ));
        }
        assert_eq!(
            decode(ValueType::Vector3, &[OscType::Float(1.0), OscType::Float(2.0)]),
            Err(DecodeError::Arity {
                value_type: ValueType::Vector3,
                expected: 3,
                actual: 2
            })
        );
        assert!(decode(ValueType::Float, &[]).is_err());
    }

    #[test]
    fn test_non_numeric_vector_argument_fails() {
        let args = [
            OscType::Float(1.0),
            OscType::String("up".into()),
            OscType::Float(3.0),
        ];
        match decode(ValueType::Vector3, &args) {
            Err(DecodeError::InvalidArgument { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_values_fail() {
        let args = [
            OscType::Float(1.0),
            OscType::Float(f32::INFINITY),
            OscType::Float(0.0),
        ];
        match decode(ValueType::Vector3, &args) {
            Err(DecodeError::InvalidArgument { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(decode(
            ValueType::Vector2,
            &[OscType::Double(f64::NAN), OscType::Double(0.0)]
        )
        .is_err());
        assert!(decode(ValueType::Float, &[OscType::Float(f32::NEG_INFINITY)]).is_err());
        assert!(decode(ValueType::Float, &[OscType::String("inf".into())]).is_err());
        assert!(decode(ValueType::Float, &[OscType::String("NaN".into())]).is_err());
    }

    #[test]
    fn test_unparseable_scalars_fail() {
        assert!(decode(ValueType::Float, &[OscType::String("fast".into())]).is_err());
        assert!(decode(ValueType::Bool, &[OscType::String("maybe".into())]).is_err());
        assert!(decode(ValueType::Int, &[OscType::Nil]).is_err());
        assert!(decode(ValueType::String, &[OscType::Blob(vec![1, 2])]).is_err());
    }
}
