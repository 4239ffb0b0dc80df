/// Parses a loosely formatted number the way spreadsheet exports write them.
///
/// Whitespace (including non-breaking spaces) is ignored. When both `.` and
/// `,` appear, the right-most one is the decimal separator and the other is
/// a thousands separator. A lone `,` is a decimal separator unless it occurs
/// more than once. Blank or non-numeric input yields `0.0`.
pub fn parse_amount(raw: &str) -> f64 {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return 0.0;
    }

    let last_dot = compact.rfind('.');
    let last_comma = compact.rfind(',');

    let normalized = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) if comma > dot => compact.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => compact.replace(',', ""),
        (None, Some(_)) if compact.matches(',').count() > 1 => compact.replace(',', ""),
        (None, Some(_)) => compact.replace(',', "."),
        _ => compact,
    };

    match normalized.parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => 0.0,
    }
}

/// Like [`parse_amount`] but distinguishes a blank cell from a zero.
pub fn parse_optional_amount(raw: &str) -> Option<f64> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(parse_amount(raw))
    }
}

pub fn round_cents(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // Avoid printing "-0.00".
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Two decimals with comma thousands separators, e.g. `1,234.50`.
pub fn format_amount(value: f64) -> String {
    let fixed = format!("{:.2}", round_cents(value));
    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}{}.{}", sign, grouped, frac_part)
}

pub fn format_euro(value: f64) -> String {
    format!("{} €", format_amount(value))
}
