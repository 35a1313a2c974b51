use crate::domain::reputation::round_half_up;

/// Renders a delay magnitude for display, pt-BR wording: whole days under a
/// month, half-month precision up to a year, years plus a month remainder
/// beyond that. Early deliveries get an " adiantado" suffix instead of a
/// negative number; a rounded zero reads "Em dia".
pub fn format_delay(days: f64) -> String {
    let rounded = round_half_up(days);
    if rounded == 0 {
        return "Em dia".to_string();
    }

    let suffix = if rounded < 0 { " adiantado" } else { "" };
    let absolute = rounded.abs() as f64;

    if absolute >= 365.25 {
        let years = (absolute / 365.25).floor() as i64;
        let remaining_months = (absolute % 365.25) / 30.44;
        let months = (remaining_months * 2.0).round() / 2.0;

        let mut out = format!("{years}a");
        if months > 0.0 {
            out.push(' ');
            out.push_str(&format_half(months));
            out.push('m');
        }
        out.push_str(suffix);
        return out;
    }

    if absolute >= 30.0 {
        let months = (absolute / 30.44 * 2.0).round() / 2.0;
        let noun = if months == 1.0 { "mês" } else { "meses" };
        return format!("{} {}{}", format_half(months), noun, suffix);
    }

    let whole = absolute as i64;
    let plural = if whole == 1 { "" } else { "s" };
    format!("{whole} dia{plural}{suffix}")
}

// Half-step values with a pt-BR decimal comma: 2 -> "2", 1.5 -> "1,5".
fn format_half(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{},5", value.trunc() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_on_time() {
        assert_eq!(format_delay(0.0), "Em dia");
        assert_eq!(format_delay(0.4), "Em dia");
        assert_eq!(format_delay(-0.5), "Em dia");
    }

    #[test]
    fn test_days_singular_and_plural() {
        assert_eq!(format_delay(1.0), "1 dia");
        assert_eq!(format_delay(12.0), "12 dias");
        assert_eq!(format_delay(29.0), "29 dias");
    }

    #[test]
    fn test_fifty_one_days_reads_one_and_a_half_months() {
        // 51 / 30.44 = 1.67..., which rounds to the nearest half: 1.5.
        assert_eq!(format_delay(51.0), "1,5 meses");
    }

    #[test]
    fn test_single_month_uses_singular_noun() {
        assert_eq!(format_delay(30.0), "1 mês");
    }

    #[test]
    fn test_years_with_month_remainder() {
        // 2015-02-01 to 2017-08-01 in the demo data: 912 days.
        assert_eq!(format_delay(912.0), "2a 6m");
        assert_eq!(format_delay(366.0), "1a");
    }

    #[test]
    fn test_early_delivery_suffix() {
        assert_eq!(format_delay(-6.0), "6 dias adiantado");
        assert_eq!(format_delay(-45.0), "1,5 meses adiantado");
    }
}
