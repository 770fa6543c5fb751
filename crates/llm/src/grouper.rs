//! Grouper: split a run of captions into titled same-event subgroups

use serde::Deserialize;

use crate::client::LlmClient;
use crate::LlmError;

const GROUPING_MAX_TOKENS: usize = 500;

const GROUPING_AND_TITLE_PROMPT: &str = r#"
You are an AI assistant that groups sentences describing the same event.
You will be given a sequence of sentences in order describing the scenes from a video. Follow these steps for each input:
    1. Read the full list of sentences.
    2. Compare adjacent sentences and decide whether each pair belongs to the same event.
    3. Merge contiguous sentences into a group when they describe the same event.
    4. Each group must be contiguous (consecutive indexes).
    5. Give each group a short descriptive title (3-6 words is ideal). Do not give generic titles, give something that signifies the highlight.
        For example:
            1. Messi scored goal
            2. Car crash
            3. New product unveiled
    6. Return only a valid JSON object with a top-level key "groups" whose value is a list of groups. Each group is an object with "title" and "indexes" (0-based list of integers).
    7. Do not output any reasoning, explanations, or extra text - only the JSON.
    8. If a sentence is unique (not contiguous with same-event neighbors), it becomes a single-item group.

### Example
    Input:
    [
        "Violent brawl erupts between Swans and Lions fans at Brisbane's Gabba stadium.",
        "Reporter covering post-game brawl between Swans and Lions fans at Brisbane's Gabba stadium.",
        "Sunny day at the beach with kids playing volleyball."
    ]

    Output:
    {
        "groups": [
            {
                "title": "Swans vs Lions post-game brawl",
                "indexes": [0, 1]
            },
            {
                "title": "Beach volleyball fun",
                "indexes": [2]
            }
        ]
    }

## Output format (JSON):
    {
        "groups": [
            {"title": "...", "indexes": [0, 1]},
            {"title": "...", "indexes": [2]}
        ]
    }
**Note**: Do not add anything extra to the output.
"#;

/// One titled subgroup; `indexes` are 0-based into the submitted caption list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TitledGroup {
    pub title: String,
    pub indexes: Vec<usize>,
}

#[derive(Debug, Deserialize)]
struct GroupsReply {
    groups: Vec<TitledGroup>,
}

/// Grouping service over the shared client
#[derive(Clone)]
pub struct Grouper {
    client: LlmClient,
}

impl Grouper {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    /// Group the captions into titled contiguous subgroups.
    ///
    /// Groups with empty index lists are dropped; an entirely empty reply is
    /// an error the caller bypasses with one whole-block group.
    pub async fn group_and_title(&self, captions: &[String]) -> Result<Vec<TitledGroup>, LlmError> {
        let value = self
            .client
            .invoke_json(
                GROUPING_AND_TITLE_PROMPT,
                captions,
                &[],
                GROUPING_MAX_TOKENS,
            )
            .await?;

        let reply: GroupsReply = serde_json::from_value(value)
            .map_err(|e| LlmError::InvalidResponse(format!("grouper reply: {e}")))?;

        let groups: Vec<TitledGroup> = reply
            .groups
            .into_iter()
            .filter(|g| !g.indexes.is_empty())
            .collect();
        if groups.is_empty() {
            return Err(LlmError::InvalidResponse(
                "grouper returned no usable groups".to_string(),
            ));
        }
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_groups_reply() {
        let reply: GroupsReply = serde_json::from_str(
            r#"{"groups": [
                {"title": "Post-game brawl", "indexes": [0, 1]},
                {"title": "Beach volleyball fun", "indexes": [2]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(reply.groups.len(), 2);
        assert_eq!(reply.groups[0].indexes, vec![0, 1]);
        assert_eq!(reply.groups[1].title, "Beach volleyball fun");
    }

    #[test]
    fn test_missing_groups_key_rejected() {
        assert!(serde_json::from_str::<GroupsReply>(r#"{"titles": []}"#).is_err());
    }

    #[test]
    fn test_non_contiguous_indexes_still_parse() {
        // The assembler tolerates these by taking min/max.
        let reply: GroupsReply =
            serde_json::from_str(r#"{"groups": [{"title": "t", "indexes": [0, 2, 5]}]}"#).unwrap();
        assert_eq!(reply.groups[0].indexes, vec![0, 2, 5]);
    }
}
