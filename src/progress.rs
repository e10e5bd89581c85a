//! Terminal progress bars for the long-running stages

use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar over `len` work items, labelled with `stage`. Hidden unless
/// `visible`, so library callers and tests draw nothing.
pub fn stage_bar(visible: bool, len: usize, stage: &str) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(len as u64);
    match ProgressStyle::default_bar()
        .template("{msg:>20} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        Ok(style) => bar.set_style(style.progress_chars("#>-")),
        Err(e) => log::debug!("Falling back to the default progress style: {}", e),
    }
    bar.set_message(stage.to_string());
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_bar_still_counts() {
        let bar = stage_bar(false, 10, "hop distances");
        assert!(bar.is_hidden());
        bar.inc(3);
        assert_eq!(bar.position(), 3);
        bar.finish_and_clear();
    }

    #[test]
    fn visible_bar_has_length() {
        let bar = stage_bar(true, 7, "scoring");
        assert_eq!(bar.length(), Some(7));
        bar.finish_and_clear();
    }
}
