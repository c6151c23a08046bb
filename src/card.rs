use crate::block::{Block, Span};
use crate::config::LabelsConfig;
use crate::parser::parse;
use crate::reveal::RevealSteps;
use crate::task::{Step, TaskData};

/// Lay out a task as blocks: title, description, then each subtask with its
/// revealed steps. `reveal` limits the steps shown per subtask.
pub fn task_to_blocks(task: &TaskData, reveal: Option<usize>, labels: &LabelsConfig) -> Vec<Block> {
    let mut blocks = vec![Block::Heading {
        level: 1,
        content: parse(&task.title),
    }];

    if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
        blocks.push(Block::Paragraph {
            content: parse(description),
        });
    }

    for (index, subtask) in task.subtasks.iter().enumerate() {
        let total = subtask.steps.len();
        let state = match reveal {
            Some(count) => RevealSteps::with_revealed(total, count),
            None => RevealSteps::with_revealed(total, total),
        };

        let mut heading = vec![Span::text(format!("{}) ", subtask_letter(index)))];
        heading.extend(parse(&subtask.question));
        blocks.push(Block::Heading {
            level: 2,
            content: heading,
        });

        for (number, step) in subtask.steps.iter().take(state.revealed()).enumerate() {
            push_step(&mut blocks, number + 1, step, labels);
        }

        if !state.is_complete() {
            let note = labels
                .hidden_steps
                .replace("{count}", &state.hidden().to_string());
            blocks.push(Block::Paragraph {
                content: vec![Span::Italic(vec![Span::text(note)])],
            });
        }

        if index + 1 < task.subtasks.len() {
            blocks.push(Block::Rule);
        }
    }

    blocks
}

fn push_step(blocks: &mut Vec<Block>, number: usize, step: &Step, labels: &LabelsConfig) {
    let mut heading = vec![Span::text(format!("{} {}: ", labels.step, number))];
    heading.extend(parse(&step.title));
    blocks.push(Block::Heading {
        level: 3,
        content: heading,
    });

    blocks.push(Block::Equation {
        label: Some(labels.origin.clone()),
        source: step.origin.clone(),
    });
    if let Some(application) = step.application.as_deref().filter(|a| !a.is_empty()) {
        blocks.push(Block::Equation {
            label: Some(labels.application.clone()),
            source: application.to_string(),
        });
    }

    blocks.push(Block::Paragraph {
        content: parse(&step.explanation),
    });
}

/// A, B, ..., Z, AA, AB, ...
fn subtask_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push((b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    letters.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Subtask;
    use pretty_assertions::assert_eq;

    fn step(title: &str) -> Step {
        Step {
            title: title.to_string(),
            origin: "x_{i} = \\frac{n_i}{n}".to_string(),
            application: None,
            explanation: "Mit x_{6A} folgt *alles*.".to_string(),
        }
    }

    fn task(steps: usize) -> TaskData {
        TaskData {
            title: "Aufgabe $4$".to_string(),
            description: None,
            subtasks: vec![Subtask {
                question: "Druck p_4".to_string(),
                steps: (1..=steps).map(|i| step(&format!("S{i}"))).collect(),
            }],
            meta: None,
        }
    }

    #[test]
    fn full_layout() {
        let blocks = task_to_blocks(&task(1), None, &LabelsConfig::default());
        assert_eq!(
            blocks,
            vec![
                Block::Heading {
                    level: 1,
                    content: vec![Span::text("Aufgabe "), Span::math("4")],
                },
                Block::Heading {
                    level: 2,
                    content: vec![Span::text("A) "), Span::text("Druck "), Span::math("p_4")],
                },
                Block::Heading {
                    level: 3,
                    content: vec![Span::text("Schritt 1: "), Span::text("S1")],
                },
                Block::Equation {
                    label: Some("Ansatz / Herkunft".to_string()),
                    source: "x_{i} = \\frac{n_i}{n}".to_string(),
                },
                Block::Paragraph {
                    content: vec![
                        Span::text("Mit "),
                        Span::math("x_{6A}"),
                        Span::text(" folgt "),
                        Span::Italic(vec![Span::text("alles")]),
                        Span::text("."),
                    ],
                },
            ]
        );
    }

    #[test]
    fn hidden_steps_leave_a_note() {
        let blocks = task_to_blocks(&task(3), Some(1), &LabelsConfig::default());
        let steps = blocks
            .iter()
            .filter(|b| matches!(b, Block::Heading { level: 3, .. }))
            .count();
        assert_eq!(steps, 1);
        assert_eq!(
            blocks.last(),
            Some(&Block::Paragraph {
                content: vec![Span::Italic(vec![Span::text("2 weitere Schritte")])],
            })
        );
    }

    #[test]
    fn subtasks_are_separated_by_rules() {
        let mut t = task(0);
        t.subtasks.push(t.subtasks[0].clone());
        let blocks = task_to_blocks(&t, None, &LabelsConfig::default());
        assert_eq!(blocks.iter().filter(|b| **b == Block::Rule).count(), 1);
    }

    #[test]
    fn letters() {
        assert_eq!(subtask_letter(0), "A");
        assert_eq!(subtask_letter(25), "Z");
        assert_eq!(subtask_letter(26), "AA");
    }
}
