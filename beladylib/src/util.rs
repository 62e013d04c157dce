use regex::Regex;

/// Parses an instruction count with an optional scale suffix
///
/// Trace windows are quoted in thousands, millions, or billions of
/// instructions, so the CLI accepts `K`, `M`, and `B` suffixes (either case)
///
/// # Arguments
///
/// * `input`: The count as written on the command line
///
/// returns: Result<u64, String>
///
/// # Examples
///
/// ```
/// use beladylib::util::parse_instruction_count;
/// assert_eq!(parse_instruction_count("500K").unwrap(), 500_000);
/// assert_eq!(parse_instruction_count("50m").unwrap(), 50_000_000);
/// assert_eq!(parse_instruction_count("1B").unwrap(), 1_000_000_000);
/// assert_eq!(parse_instruction_count("1234").unwrap(), 1234);
/// ```
pub fn parse_instruction_count(input: &str) -> Result<u64, String> {
    let pattern = Regex::new(r"^(?P<value>[0-9]+)(?P<suffix>[kKmMbB])?$")
        .map_err(|e| format!("Couldn't compile the instruction count pattern: {e}"))?;
    let tokens = pattern
        .captures(input)
        .ok_or(format!("Not an instruction count: {input}"))?;
    let value: u64 = tokens
        .name("value")
        .ok_or("Couldn't get the numeric part of the instruction count".to_string())?
        .as_str()
        .parse()
        .map_err(|e| format!("Couldn't parse the instruction count {input}: {e}"))?;
    let multiplier = match tokens.name("suffix").map(|s| s.as_str()) {
        Some("k") | Some("K") => 1_000,
        Some("m") | Some("M") => 1_000_000,
        Some("b") | Some("B") => 1_000_000_000,
        _ => 1,
    };
    value
        .checked_mul(multiplier)
        .ok_or(format!("Instruction count {input} overflows a 64-bit counter"))
}
