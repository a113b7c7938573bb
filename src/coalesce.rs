//! Fragment coalescing: a second normalization pass over merged sections.
//!
//! Handles TOCs that split one logical section across several entries:
//! repeated titles, an empty heading entry followed by its real title, and
//! near-empty entries followed by untitled continuation fragments.

use crate::extract::ExtractOptions;
use crate::patterns::{is_heading_like, normalize_title};
use crate::resolve::Section;

/// How the entry following the current one is folded into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Merge {
    /// Same title: concatenate spans.
    Duplicate,
    /// Current is empty and the next title extends it: take the next entry over.
    AdoptTitle,
    /// Current is blank and the next entry is not a heading: absorb it.
    Orphan,
}

fn decide(current: &Section, next: &Section, step: usize, options: &ExtractOptions) -> Option<Merge> {
    let current_title = normalize_title(&current.title);
    let next_title = normalize_title(&next.title);

    if current_title == next_title {
        return Some(Merge::Duplicate);
    }

    if step == 1
        && current.text_len() == 0
        && !current_title.is_empty()
        && !next_title.is_empty()
        && (next_title.contains(&current_title) || current_title.contains(&next_title))
        && next.text_len() > options.substantial_len
    {
        return Some(Merge::AdoptTitle);
    }

    if current.is_blank(options.blank_threshold)
        && next.text_len() > 0
        && !is_heading_like(&next.title)
    {
        return Some(Merge::Orphan);
    }

    None
}

/// Coalesce fragments, looking at most `options.coalesce_lookahead` entries ahead.
///
/// Order is preserved: an entry is only ever merged into an earlier one, and
/// lookahead stops at the first entry that is kept separate.
pub fn coalesce(sections: Vec<Section>, options: &ExtractOptions) -> Vec<Section> {
    let mut slots: Vec<Option<Section>> = sections.into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(slots.len());

    for i in 0..slots.len() {
        let Some(mut current) = slots[i].take() else {
            continue;
        };

        for step in 1..=options.coalesce_lookahead {
            let j = i + step;
            if j >= slots.len() {
                break;
            }
            let Some(next) = slots[j].as_ref() else {
                continue;
            };

            let Some(decision) = decide(&current, next, step, options) else {
                break;
            };
            let Some(next) = slots[j].take() else {
                break;
            };

            match decision {
                Merge::Duplicate => {
                    tracing::debug!(title = %current.title, "merging duplicate-titled fragment");
                    current.container_hint |= next.container_hint;
                    current.division |= next.division;
                    current.absorbed.push(next.origin);
                    current.absorbed.extend(next.absorbed);
                    current.span.extend(next.span);
                }
                Merge::AdoptTitle => {
                    tracing::debug!(
                        from = %current.title,
                        to = %next.title,
                        "empty entry adopts the following title"
                    );
                    current.absorbed.push(current.origin);
                    current.absorbed.extend(next.absorbed);
                    current.title = next.title;
                    current.origin = next.origin;
                    current.resolution = next.resolution;
                    current.span = next.span;
                    current.container_hint |= next.container_hint;
                    current.division |= next.division;
                    break;
                }
                Merge::Orphan => {
                    tracing::debug!(
                        title = %current.title,
                        orphan = %next.title,
                        "absorbing continuation fragment"
                    );
                    current.absorbed.push(next.origin);
                    current.absorbed.extend(next.absorbed);
                    current.span.extend(next.span);
                }
            }
        }

        out.push(current);
    }

    out
}
