use fleet_types::MetricHistoryEntry;

/// True if the last `samples` entries of `history` (most recent last) all
/// satisfy `pred`. Used for the two-sample up-trigger confirmation window.
pub fn sustained_recent<F>(history: &[MetricHistoryEntry], samples: usize, pred: F) -> bool
where
    F: Fn(&MetricHistoryEntry) -> bool,
{
    if history.len() < samples {
        return false;
    }
    history[history.len() - samples..].iter().all(pred)
}

/// True if every entry currently held in the bounded history window
/// satisfies `pred`. Used for the scale-down full-window confirmation,
/// the stricter of the two variants the source exhibited (see DESIGN.md).
pub fn sustained_window<F>(history: &[MetricHistoryEntry], window: usize, pred: F) -> bool
where
    F: Fn(&MetricHistoryEntry) -> bool,
{
    if history.len() < window {
        return false;
    }
    history.iter().all(pred)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(cpu: f64) -> MetricHistoryEntry {
        MetricHistoryEntry {
            t: 0,
            cpu,
            mem: 0.0,
            pending: 0,
            latency: None,
            error_rate: None,
            queue_depth: None,
        }
    }

    #[test]
    fn recent_requires_exact_tail_count() {
        let h = vec![entry(10.0), entry(80.0), entry(85.0)];
        assert!(sustained_recent(&h, 2, |e| e.cpu > 70.0));
        assert!(!sustained_recent(&h, 3, |e| e.cpu > 70.0));
    }

    #[test]
    fn window_requires_full_history_length() {
        let h = vec![entry(10.0); 9];
        assert!(!sustained_window(&h, 10, |e| e.cpu < 30.0));
        let h = vec![entry(10.0); 10];
        assert!(sustained_window(&h, 10, |e| e.cpu < 30.0));
    }
}
