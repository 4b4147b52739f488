//! String built-in.
//!
//! Provides String constructor and prototype methods. Indices count
//! characters, matching how `length` and `s[i]` read strings.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::type_conversion::{to_number, to_string};
use crate::runner::ds::value::{check_string_length, JsValue};
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

use super::arg;

/// Register the String built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let string = BuiltInObject::new("String")
        .with_constructor(string_constructor)
        .add_prototype_method("charAt", string_char_at)
        .add_prototype_method("charCodeAt", string_char_code_at)
        .add_prototype_method("substring", string_substring)
        .add_prototype_method("slice", string_slice)
        .add_prototype_method("indexOf", string_index_of)
        .add_prototype_method("lastIndexOf", string_last_index_of)
        .add_prototype_method("includes", string_includes)
        .add_prototype_method("startsWith", string_starts_with)
        .add_prototype_method("endsWith", string_ends_with)
        .add_prototype_method("split", string_split)
        .add_prototype_method("trim", string_trim)
        .add_prototype_method("trimStart", string_trim_start)
        .add_prototype_method("trimEnd", string_trim_end)
        .add_prototype_method("toUpperCase", string_to_upper_case)
        .add_prototype_method("toLowerCase", string_to_lower_case)
        .add_prototype_method("repeat", string_repeat)
        .add_prototype_method("padStart", string_pad_start)
        .add_prototype_method("padEnd", string_pad_end)
        .add_prototype_method("replace", string_replace)
        .add_prototype_method("replaceAll", string_replace_all)
        .add_prototype_method("concat", string_concat)
        .add_prototype_method("toString", string_value_of)
        .add_prototype_method("valueOf", string_value_of)
        .add_method("fromCharCode", string_from_char_code);

    registry.register_object(string);
}

fn this_string(this: &JsValue, ctx: &mut EvalContext) -> Result<String, JErrorType> {
    match this {
        JsValue::Undefined | JsValue::Null => Err(JErrorType::type_error(format!(
            "String.prototype method called on {}",
            this
        ))),
        other => to_string(other, ctx),
    }
}

fn string_arg(args: &[JsValue], i: usize, ctx: &mut EvalContext) -> Result<String, JErrorType> {
    to_string(&arg(args, i), ctx)
}

/// Integer argument; `default` when absent, 0 for NaN.
fn integer_arg(args: &[JsValue], i: usize, default: f64, ctx: &mut EvalContext) -> Result<f64, JErrorType> {
    let value = arg(args, i);
    if value.is_undefined() {
        return Ok(default);
    }
    let n = to_number(&value, ctx)?;
    Ok(if n.is_nan() { 0.0 } else { n.trunc() })
}

fn clamp(n: f64, len: usize) -> usize {
    n.max(0.0).min(len as f64) as usize
}

fn substring_chars(s: &str, start: usize, end: usize) -> String {
    s.chars().skip(start).take(end.saturating_sub(start)).collect()
}

/// Character index of the first match of `needle` at or after `from`.
fn find_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let chars: Vec<char> = haystack.chars().collect();
    let needle: Vec<char> = needle.chars().collect();
    if needle.len() > chars.len() {
        return None;
    }
    (from..=chars.len() - needle.len()).find(|&i| chars[i..i + needle.len()] == needle[..])
}

/// String constructor.
fn string_constructor(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    if args.is_empty() {
        Ok(JsValue::String(String::new()))
    } else {
        Ok(JsValue::String(to_string(&args[0], ctx)?))
    }
}

/// String.prototype.valueOf
fn string_value_of(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(this_string(&this, ctx)?))
}

/// String.prototype.charAt
fn string_char_at(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, ctx)?;
    let index = integer_arg(&args, 0, 0.0, ctx)?;
    let c = if index < 0.0 {
        None
    } else {
        s.chars().nth(index as usize)
    };
    Ok(JsValue::String(c.map(String::from).unwrap_or_default()))
}

/// String.prototype.charCodeAt
fn string_char_code_at(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, ctx)?;
    let index = integer_arg(&args, 0, 0.0, ctx)?;
    let code = if index < 0.0 {
        None
    } else {
        s.chars().nth(index as usize)
    };
    Ok(JsValue::number(code.map(|c| c as u32 as f64).unwrap_or(f64::NAN)))
}

/// String.prototype.substring
fn string_substring(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, ctx)?;
    let len = s.chars().count();
    let start = clamp(integer_arg(&args, 0, 0.0, ctx)?, len);
    let end = clamp(integer_arg(&args, 1, len as f64, ctx)?, len);
    let (start, end) = if start > end { (end, start) } else { (start, end) };
    Ok(JsValue::String(substring_chars(&s, start, end)))
}

/// String.prototype.slice
fn string_slice(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, ctx)?;
    let len = s.chars().count();
    let relative = |n: f64| {
        if n < 0.0 {
            clamp(len as f64 + n, len)
        } else {
            clamp(n, len)
        }
    };
    let start = relative(integer_arg(&args, 0, 0.0, ctx)?);
    let end = relative(integer_arg(&args, 1, len as f64, ctx)?);
    Ok(JsValue::String(substring_chars(&s, start, end)))
}

/// String.prototype.indexOf
fn string_index_of(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, ctx)?;
    let needle = string_arg(&args, 0, ctx)?;
    let from = clamp(integer_arg(&args, 1, 0.0, ctx)?, s.chars().count());
    Ok(JsValue::number(
        find_from(&s, &needle, from).map(|i| i as f64).unwrap_or(-1.0),
    ))
}

/// String.prototype.lastIndexOf
fn string_last_index_of(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, ctx)?;
    let needle = string_arg(&args, 0, ctx)?;
    let mut last = None;
    let mut from = 0;
    while let Some(i) = find_from(&s, &needle, from) {
        last = Some(i);
        from = i + 1;
    }
    Ok(JsValue::number(last.map(|i| i as f64).unwrap_or(-1.0)))
}

/// String.prototype.includes
fn string_includes(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, ctx)?;
    let needle = string_arg(&args, 0, ctx)?;
    let from = clamp(integer_arg(&args, 1, 0.0, ctx)?, s.chars().count());
    Ok(JsValue::Boolean(find_from(&s, &needle, from).is_some()))
}

/// String.prototype.startsWith
fn string_starts_with(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, ctx)?;
    let prefix = string_arg(&args, 0, ctx)?;
    let from = clamp(integer_arg(&args, 1, 0.0, ctx)?, s.chars().count());
    let rest: String = s.chars().skip(from).collect();
    Ok(JsValue::Boolean(rest.starts_with(&prefix)))
}

/// String.prototype.endsWith
fn string_ends_with(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, ctx)?;
    let suffix = string_arg(&args, 0, ctx)?;
    let len = s.chars().count();
    let end = clamp(integer_arg(&args, 1, len as f64, ctx)?, len);
    Ok(JsValue::Boolean(substring_chars(&s, 0, end).ends_with(&suffix)))
}

/// String.prototype.split
fn string_split(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, ctx)?;
    let limit = match arg(&args, 1) {
        JsValue::Undefined => usize::MAX,
        other => to_number(&other, ctx)?.max(0.0) as usize,
    };
    let parts: Vec<String> = match arg(&args, 0) {
        JsValue::Undefined => vec![s],
        separator => {
            let separator = to_string(&separator, ctx)?;
            if separator.is_empty() {
                s.chars().map(String::from).collect()
            } else {
                s.split(separator.as_str()).map(String::from).collect()
            }
        }
    };
    let parts = parts.into_iter().take(limit).map(JsValue::String).collect();
    Ok(ctx.new_array(parts))
}

/// String.prototype.trim
fn string_trim(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::string(this_string(&this, ctx)?.trim()))
}

/// String.prototype.trimStart
fn string_trim_start(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::string(this_string(&this, ctx)?.trim_start()))
}

/// String.prototype.trimEnd
fn string_trim_end(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::string(this_string(&this, ctx)?.trim_end()))
}

/// String.prototype.toUpperCase
fn string_to_upper_case(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(this_string(&this, ctx)?.to_uppercase()))
}

/// String.prototype.toLowerCase
fn string_to_lower_case(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(this_string(&this, ctx)?.to_lowercase()))
}

/// String.prototype.repeat
fn string_repeat(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, ctx)?;
    let count = integer_arg(&args, 0, 0.0, ctx)?;
    if count < 0.0 || count.is_infinite() {
        return Err(JErrorType::RangeError(format!("Invalid count value: {}", count)));
    }
    check_string_length(s.len() as f64 * count)?;
    Ok(JsValue::String(s.repeat(count as usize)))
}

fn padding(s: &str, args: &[JsValue], ctx: &mut EvalContext) -> Result<String, JErrorType> {
    let target = integer_arg(args, 0, 0.0, ctx)?;
    let filler = match arg(args, 1) {
        JsValue::Undefined => " ".to_string(),
        other => to_string(&other, ctx)?,
    };
    let len = s.chars().count();
    if target <= len as f64 || filler.is_empty() {
        return Ok(String::new());
    }
    check_string_length(s.len() as f64 + (target - len as f64) * filler.len() as f64)?;
    Ok(filler.chars().cycle().take(target as usize - len).collect())
}

/// String.prototype.padStart
fn string_pad_start(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, ctx)?;
    let pad = padding(&s, &args, ctx)?;
    Ok(JsValue::String(pad + &s))
}

/// String.prototype.padEnd
fn string_pad_end(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, ctx)?;
    let pad = padding(&s, &args, ctx)?;
    Ok(JsValue::String(s + &pad))
}

/// String.prototype.replace (string patterns only)
fn string_replace(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, ctx)?;
    let pattern = string_arg(&args, 0, ctx)?;
    let replacement = string_arg(&args, 1, ctx)?;
    Ok(JsValue::String(s.replacen(&pattern, &replacement, 1)))
}

/// String.prototype.replaceAll (string patterns only)
fn string_replace_all(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, ctx)?;
    let pattern = string_arg(&args, 0, ctx)?;
    let replacement = string_arg(&args, 1, ctx)?;
    if pattern.is_empty() {
        let mut out = replacement.clone();
        for c in s.chars() {
            out.push(c);
            out.push_str(&replacement);
        }
        return Ok(JsValue::String(out));
    }
    Ok(JsValue::String(s.replace(&pattern, &replacement)))
}

/// String.prototype.concat
fn string_concat(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let mut result = this_string(&this, ctx)?;
    for a in &args {
        let part = to_string(a, ctx)?;
        check_string_length((result.len() + part.len()) as f64)?;
        result.push_str(&part);
    }
    Ok(JsValue::String(result))
}

/// String.fromCharCode
fn string_from_char_code(
    ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let mut units = Vec::with_capacity(args.len());
    for a in &args {
        let n = to_number(a, ctx)?;
        units.push(if n.is_finite() { n as i64 as u16 } else { 0 });
    }
    Ok(JsValue::String(String::from_utf16_lossy(&units)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(
        f: fn(&mut EvalContext, JsValue, Vec<JsValue>) -> Result<JsValue, JErrorType>,
        this: &str,
        args: Vec<JsValue>,
    ) -> JsValue {
        let mut ctx = EvalContext::new();
        f(&mut ctx, JsValue::string(this), args).unwrap()
    }

    #[test]
    fn test_slice_and_substring() {
        assert_eq!(
            call(string_slice, "hello", vec![JsValue::number(-3.0)]),
            JsValue::string("llo")
        );
        assert_eq!(
            call(string_substring, "hello", vec![JsValue::number(3.0), JsValue::number(1.0)]),
            JsValue::string("el")
        );
    }

    #[test]
    fn test_oversized_results_are_range_errors() {
        let mut ctx = EvalContext::new();
        let repeated = string_repeat(&mut ctx, JsValue::string("ab"), vec![JsValue::number(1e12)]);
        assert!(matches!(repeated, Err(JErrorType::RangeError(m)) if m == "Invalid string length"));
        let padded = string_pad_start(&mut ctx, JsValue::string("a"), vec![JsValue::number(1e12)]);
        assert!(matches!(padded, Err(JErrorType::RangeError(_))));
        assert_eq!(
            call(string_repeat, "ab", vec![JsValue::number(3.0)]),
            JsValue::string("ababab")
        );
    }

    #[test]
    fn test_padding() {
        assert_eq!(
            call(string_pad_start, "5", vec![JsValue::number(3.0), JsValue::string("0")]),
            JsValue::string("005")
        );
        assert_eq!(
            call(string_pad_end, "ab", vec![JsValue::number(5.0), JsValue::string("xy")]),
            JsValue::string("abxyx")
        );
    }

    #[test]
    fn test_search() {
        assert_eq!(
            call(string_index_of, "banana", vec![JsValue::string("an"), JsValue::number(2.0)]),
            JsValue::number(3.0)
        );
        assert_eq!(
            call(string_last_index_of, "banana", vec![JsValue::string("an")]),
            JsValue::number(3.0)
        );
        assert_eq!(
            call(string_includes, "banana", vec![JsValue::string("nab")]),
            JsValue::Boolean(false)
        );
    }
}
