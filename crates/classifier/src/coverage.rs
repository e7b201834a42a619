use crate::pattern::PatternScorer;
use crate::taxonomy::{Label, Taxonomy};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageStatus {
    /// Every category was already present.
    Complete,
    /// Missing categories were filled without forced moves.
    Repaired,
    /// A forced move happened, or some category is still missing.
    Partial,
    /// Coverage enforcement is disabled for this engine.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReassignReason {
    /// The item had no category (general or unclassified).
    FreeItem,
    /// The item came from the largest category with more than one member.
    Donor,
    /// No donor existed; item 0 was overwritten.
    Forced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reassignment {
    pub index: usize,
    pub from: String,
    pub to: String,
    pub reason: ReassignReason,
}

/// What the coverage pass did to an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    pub status: CoverageStatus,
    pub reassignments: Vec<Reassignment>,
    /// Categories with no item after the pass.
    pub missing: Vec<String>,
}

impl CoverageReport {
    /// Report for an assignment left untouched because enforcement is off.
    #[must_use]
    pub fn skipped(taxonomy: &Taxonomy, labels: &[Label]) -> Self {
        let counts = count_categories(taxonomy.len(), labels);
        Self {
            status: CoverageStatus::Skipped,
            reassignments: vec![],
            missing: missing_names(taxonomy, &counts),
        }
    }
}

/// Relabels items so every category of the taxonomy has at least one member.
///
/// Missing categories are filled in declaration order. Each takes, in order of preference:
/// the unlabelled item that best matches its lexicon, the best-matching item of the largest
/// category that can spare one, or item 0 unconditionally. Keyword-score ties resolve to the
/// lowest item index and donor ties to the earliest-declared category, so the result is a pure
/// function of the input. With at least as many items as categories the forced path is never
/// reached.
pub struct CoverageGuarantor<'a> {
    taxonomy: &'a Taxonomy,
    scorer: &'a PatternScorer,
}

impl<'a> CoverageGuarantor<'a> {
    #[must_use]
    pub fn new(taxonomy: &'a Taxonomy, scorer: &'a PatternScorer) -> Self {
        Self { taxonomy, scorer }
    }

    /// Repairs `labels` in place. `corpora[i]` is the aggregated text of item `i`.
    pub fn repair(&self, labels: &mut [Label], corpora: &[String]) -> CoverageReport {
        let mut counts = count_categories(self.taxonomy.len(), labels);
        let missing: Vec<usize> = (0..counts.len()).filter(|&c| counts[c] == 0).collect();
        if missing.is_empty() {
            return CoverageReport {
                status: CoverageStatus::Complete,
                reassignments: vec![],
                missing: vec![],
            };
        }

        let mut reassignments = Vec::new();
        for &target in &missing {
            if counts[target] > 0 {
                continue;
            }
            let Some((index, reason)) = self.pick(target, labels, corpora, &counts) else {
                break;
            };
            self.move_item(index, target, reason, labels, &mut counts, &mut reassignments);
        }

        // Safety net; only meaningful when there are enough items to cover every category.
        if labels.len() >= counts.len() {
            for target in 0..counts.len() {
                if counts[target] == 0 {
                    self.move_item(
                        0,
                        target,
                        ReassignReason::Forced,
                        labels,
                        &mut counts,
                        &mut reassignments,
                    );
                }
            }
        }

        let still_missing = missing_names(self.taxonomy, &counts);
        let forced = reassignments
            .iter()
            .any(|r| r.reason == ReassignReason::Forced);
        let status = if forced || !still_missing.is_empty() {
            log::warn!(
                "Partial coverage for '{}': {} items for {} categories, missing {:?}",
                self.taxonomy.name,
                labels.len(),
                counts.len(),
                still_missing
            );
            CoverageStatus::Partial
        } else {
            CoverageStatus::Repaired
        };
        log::info!(
            "Coverage for '{}': {} reassignments ({:?})",
            self.taxonomy.name,
            reassignments.len(),
            status
        );

        CoverageReport {
            status,
            reassignments,
            missing: still_missing,
        }
    }

    fn pick(
        &self,
        target: usize,
        labels: &[Label],
        corpora: &[String],
        counts: &[usize],
    ) -> Option<(usize, ReassignReason)> {
        let free = self.best_candidate(target, labels, corpora, |label| label.category().is_none());
        if let Some(index) = free {
            return Some((index, ReassignReason::FreeItem));
        }

        let mut donor: Option<usize> = None;
        for (category, &count) in counts.iter().enumerate() {
            if count > 1 && donor.map_or(true, |d| count > counts[d]) {
                donor = Some(category);
            }
        }
        if let Some(donor) = donor {
            let victim = self.best_candidate(target, labels, corpora, |label| {
                label == Label::Category(donor)
            });
            return victim.map(|index| (index, ReassignReason::Donor));
        }

        (!labels.is_empty()).then_some((0, ReassignReason::Forced))
    }

    /// Highest keyword score for `target` among items accepted by `eligible`.
    fn best_candidate(
        &self,
        target: usize,
        labels: &[Label],
        corpora: &[String],
        eligible: impl Fn(Label) -> bool,
    ) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (index, &label) in labels.iter().enumerate() {
            if !eligible(label) {
                continue;
            }
            let corpus = corpora.get(index).map_or("", String::as_str);
            let score = self.scorer.score_category(corpus, target);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((index, score));
            }
        }
        best.map(|(index, _)| index)
    }

    fn move_item(
        &self,
        index: usize,
        target: usize,
        reason: ReassignReason,
        labels: &mut [Label],
        counts: &mut [usize],
        reassignments: &mut Vec<Reassignment>,
    ) {
        let Some(slot) = labels.get_mut(index) else {
            return;
        };
        let from = *slot;
        if let Some(previous) = from.category() {
            counts[previous] = counts[previous].saturating_sub(1);
        }
        *slot = Label::Category(target);
        counts[target] += 1;

        if reason == ReassignReason::Forced {
            log::warn!(
                "Forced item {index} into '{}'",
                self.taxonomy.label_name(Label::Category(target))
            );
        } else {
            log::debug!(
                "Moved item {index} to '{}' ({reason:?})",
                self.taxonomy.label_name(Label::Category(target))
            );
        }
        reassignments.push(Reassignment {
            index,
            from: self.taxonomy.label_name(from).to_string(),
            to: self.taxonomy.label_name(Label::Category(target)).to_string(),
            reason,
        });
    }
}

fn count_categories(categories: usize, labels: &[Label]) -> Vec<usize> {
    let mut counts = vec![0; categories];
    for category in labels.iter().filter_map(|label| label.category()) {
        if let Some(count) = counts.get_mut(category) {
            *count += 1;
        }
    }
    counts
}

fn missing_names(taxonomy: &Taxonomy, counts: &[usize]) -> Vec<String> {
    counts
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(category, _)| taxonomy.label_name(Label::Category(category)).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::fixtures::letters;
    use pretty_assertions::assert_eq;

    const A: Label = Label::Category(0);
    const B: Label = Label::Category(1);
    const C: Label = Label::Category(2);
    const D: Label = Label::Category(3);
    const E: Label = Label::Category(4);

    fn repair(labels: &mut [Label], corpora: &[&str]) -> CoverageReport {
        let taxonomy = letters();
        let scorer = PatternScorer::new(&taxonomy, 20.0).unwrap();
        let corpora: Vec<String> = corpora.iter().map(ToString::to_string).collect();
        CoverageGuarantor::new(&taxonomy, &scorer).repair(labels, &corpora)
    }

    fn counts(labels: &[Label]) -> Vec<usize> {
        count_categories(5, labels)
    }

    #[test]
    fn complete_assignment_is_untouched() {
        let mut labels = vec![A, B, C, D, E, A];
        let report = repair(&mut labels, &[""; 6]);
        assert_eq!(labels, vec![A, B, C, D, E, A]);
        assert_eq!(report.status, CoverageStatus::Complete);
        assert!(report.reassignments.is_empty());
    }

    #[test]
    fn overrepresented_donors_fill_missing_categories() {
        let mut labels = vec![A, A, A, B, B];
        let report = repair(&mut labels, &[""; 5]);

        assert_eq!(labels, vec![C, D, A, E, B]);
        assert!(counts(&labels).iter().all(|&n| n >= 1));
        assert_eq!(report.status, CoverageStatus::Repaired);
        assert_eq!(report.reassignments.len(), 3);
        assert!(report
            .reassignments
            .iter()
            .all(|r| r.reason == ReassignReason::Donor));
        assert_eq!(report.reassignments[0].from, "A");
        assert_eq!(report.reassignments[0].to, "C");
    }

    #[test]
    fn victim_is_best_lexicon_match() {
        let mut labels = vec![A, A, A, B, C, D];
        let report = repair(
            &mut labels,
            &["alpha", "alpha", "alpha with an echo", "bravo", "charlie", "delta"],
        );
        assert_eq!(labels, vec![A, A, E, B, C, D]);
        assert_eq!(report.reassignments[0].index, 2);
    }

    #[test]
    fn free_items_are_used_before_donors() {
        let mut labels = vec![
            A,
            A,
            Label::General,
            Label::Unclassified,
            B,
            C,
            D,
        ];
        let report = repair(&mut labels, &["", "", "something", "", "", "", ""]);
        assert_eq!(labels[2], E);
        assert_eq!(labels[0], A);
        assert_eq!(report.reassignments[0].reason, ReassignReason::FreeItem);
        assert_eq!(report.reassignments[0].from, "General");
        assert_eq!(report.status, CoverageStatus::Repaired);
    }

    #[test]
    fn free_item_choice_follows_lexicon() {
        let mut labels = vec![Label::General, Label::General, A, B, C, D];
        repair(&mut labels, &["nothing", "echo echo", "", "", "", ""]);
        assert_eq!(labels[1], E);
        assert_eq!(labels[0], Label::General);
    }

    #[test]
    fn donor_ties_prefer_declaration_order() {
        let mut labels = vec![B, B, A, A, C];
        repair(&mut labels, &[""; 5]);
        // A and B both have two members; A is declared first and gives up item 2.
        assert_eq!(labels, vec![E, B, D, A, C]);
    }

    #[test]
    fn single_item_gets_exactly_one_category() {
        let mut labels = vec![A];
        let report = repair(&mut labels, &["alpha"]);
        assert_eq!(labels.len(), 1);
        assert!(labels[0].category().is_some());
        assert_eq!(report.status, CoverageStatus::Partial);
        assert_eq!(report.missing.len(), 4);
        assert!(report
            .reassignments
            .iter()
            .all(|r| r.reason == ReassignReason::Forced && r.index == 0));
    }

    #[test]
    fn empty_input_reports_everything_missing() {
        let mut labels: Vec<Label> = vec![];
        let report = repair(&mut labels, &[]);
        assert_eq!(report.status, CoverageStatus::Partial);
        assert_eq!(report.missing, vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn skipped_report_lists_missing() {
        let report = CoverageReport::skipped(&letters(), &[A, A, Label::General]);
        assert_eq!(report.status, CoverageStatus::Skipped);
        assert_eq!(report.missing, vec!["B", "C", "D", "E"]);
    }
}
