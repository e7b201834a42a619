use std::collections::HashMap;

const MAX_NAME_WORDS: usize = 2;
const ELLIPSIS: &str = "...";

/// Display names for clusters of free-text labels.
pub struct ClusterNamer;

impl ClusterNamer {
    /// The most frequent member (first seen wins ties), cut to two words plus `...` when
    /// longer. Empty clusters become `Group {id + 1}`.
    #[must_use]
    pub fn name(members: &[String], cluster_id: usize) -> String {
        match most_frequent(members) {
            Some(label) => truncate_words(label),
            None => format!("Group {}", cluster_id + 1),
        }
    }
}

fn most_frequent(members: &[String]) -> Option<&str> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, member) in members.iter().enumerate() {
        counts.entry(member.as_str()).or_insert((0, position)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(label, _)| label)
}

fn truncate_words(label: &str) -> String {
    let words: Vec<&str> = label.split_whitespace().collect();
    if words.len() > MAX_NAME_WORDS {
        format!("{}{ELLIPSIS}", words[..MAX_NAME_WORDS].join(" "))
    } else {
        label.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn most_frequent_member_names_the_cluster() {
        let name = ClusterNamer::name(&members(&["Survey", "Case Study", "Survey"]), 0);
        assert_eq!(name, "Survey");
    }

    #[test]
    fn ties_go_to_first_seen() {
        assert_eq!(
            ClusterNamer::name(&members(&["Qualitative", "Quantitative"]), 3),
            "Qualitative"
        );
        assert_eq!(
            ClusterNamer::name(&members(&["B", "A", "A", "B"]), 0),
            "B"
        );
    }

    #[test]
    fn long_names_are_truncated() {
        assert_eq!(
            ClusterNamer::name(&members(&["Randomized Controlled Clinical Trial"]), 0),
            "Randomized Controlled..."
        );
        assert_eq!(
            ClusterNamer::name(&members(&["Mixed Methods"]), 0),
            "Mixed Methods"
        );
    }

    #[test]
    fn empty_cluster_gets_placeholder() {
        assert_eq!(ClusterNamer::name(&[], 2), "Group 3");
    }
}
