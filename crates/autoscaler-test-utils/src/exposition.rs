//! Assertion helpers for Prometheus text exposition output.
//!
//! Parses the exporter's rendered output, which never emits timestamps and
//! does not escape label values beyond what the tests here feed it. Label
//! order in the output is not part of the contract, so lookups compare
//! label sets, not sequences.

/// Look up the sample value for `name` carrying exactly the given label set.
///
/// Returns `None` if no sample line matches. Summary component series use
/// their rendered names (`<name>_sum`, `<name>_count`, or `<name>` plus a
/// `quantile` label).
pub fn sample_value(rendered: &str, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    samples(rendered).find_map(|(sample_name, sample_labels, value)| {
        (sample_name == name && label_sets_match(&sample_labels, labels)).then_some(value)
    })
}

/// Whether any sample line exists for `name`, under any label set.
///
/// Comment lines (`# HELP`, `# TYPE`) do not count as samples.
pub fn has_series(rendered: &str, name: &str) -> bool {
    samples(rendered).any(|(sample_name, _, _)| sample_name == name)
}

fn samples<'a>(rendered: &'a str) -> impl Iterator<Item = (&'a str, Vec<(&'a str, &'a str)>, f64)> {
    rendered
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_sample)
}

/// Parse one sample line: `name{k="v",...} value` or `name value`.
fn parse_sample(line: &str) -> Option<(&str, Vec<(&str, &str)>, f64)> {
    let (series, raw_value) = line.rsplit_once(' ')?;
    let value = raw_value.parse().ok()?;

    let Some((name, rest)) = series.split_once('{') else {
        return Some((series, Vec::new(), value));
    };
    let body = rest.strip_suffix('}')?;

    let mut labels = Vec::new();
    if !body.is_empty() {
        for pair in body.split(',') {
            let (key, quoted) = pair.split_once('=')?;
            let label_value = quoted.strip_prefix('"')?.strip_suffix('"')?;
            labels.push((key, label_value));
        }
    }
    Some((name, labels, value))
}

fn label_sets_match(found: &[(&str, &str)], wanted: &[(&str, &str)]) -> bool {
    found.len() == wanted.len() && wanted.iter().all(|pair| found.contains(pair))
}
