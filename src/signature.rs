//! Turn JVM method descriptors into readable method names.
//!
//! `decode_method_name("foo", "(ILjava/lang/String;)Z")` gives
//! `"boolean foo(int,java.lang.String)"`.

/// Build a display name from a method name and its descriptor.
///
/// Signatures that are not of the form `(args)ret` leave the name unchanged.
/// A return descriptor that does not decode is dropped, and argument
/// characters that do not start a descriptor are skipped.
///
/// `J` decodes to an empty string. Existing reports are keyed on names built
/// this way, so it is kept as is.
pub fn decode_method_name(name: &str, signature: &str) -> String {
    let Some((args, ret)) = signature
        .strip_prefix('(')
        .and_then(|rest| rest.rsplit_once(')'))
    else {
        return name.to_string();
    };

    let mut out = String::new();
    if let Some((ret_type, "")) = parse_descriptor(ret) {
        out.push_str(&ret_type);
        out.push(' ');
    }
    out.push_str(name);
    out.push('(');
    out.push_str(&parse_args(args).join(","));
    out.push(')');
    out
}

fn parse_args(mut args: &str) -> Vec<String> {
    let mut decoded = Vec::new();
    while !args.is_empty() {
        match parse_descriptor(args) {
            Some((ty, rest)) => {
                decoded.push(ty);
                args = rest;
            }
            None => {
                // Brackets ahead of an undecodable element fail the same way.
                let mut chars = args.trim_start_matches('[').chars();
                chars.next();
                args = chars.as_str();
            }
        }
    }
    decoded
}

/// Decode one descriptor from the front of `s`, returning it with the rest.
fn parse_descriptor(s: &str) -> Option<(String, &str)> {
    let element = s.trim_start_matches('[');
    let dimensions = s.len() - element.len();
    let (ty, rest) = parse_element(element)?;
    Some((ty + &"[]".repeat(dimensions), rest))
}

/// Decode one non-array descriptor from the front of `s`.
fn parse_element(s: &str) -> Option<(String, &str)> {
    let mut chars = s.chars();
    let ty = match chars.next()? {
        'Z' => "boolean",
        'C' => "char",
        'B' => "byte",
        'S' => "short",
        'I' => "int",
        'F' => "float",
        'J' => "",
        'D' => "double",
        'V' => "void",
        'L' | 'T' => {
            let body = chars.as_str();
            let end = body.find(';')?;
            return Some((body[..end].replace('/', "."), &body[end + 1..]));
        }
        _ => return None,
    };
    Some((ty.to_string(), chars.as_str()))
}
