//! Personal profile setup wizard.
//!
//! Asks for each profile field in a fixed order and stores the answers as
//! the single personal record.  Existing answers are offered as defaults so
//! re-running `/setup` only needs the fields that changed.

use colored::Colorize;
use std::io::{BufRead, Write};

use memora_types::{FieldValue, PersonalRecord};

/// Field name and the question asked for it.
pub const SETUP_FIELDS: [(&str, &str); 11] = [
    ("Full Name", "What is the person's full name?"),
    ("Date of Birth", "Date of birth"),
    ("Health Conditions", "Health conditions"),
    ("Medications", "Medications and when they are taken"),
    ("Daily Routine Summary", "A short summary of a typical day"),
    ("Emotional Triggers", "Things that cause distress"),
    ("Comforting Methods", "Things that bring comfort"),
    ("Home Address", "Home address"),
    ("Emergency Contacts", "Emergency contacts (name, relation, phone)"),
    ("Memory Description", "Describe one cherished memory"),
    ("Safety Notes", "Anything a helper should know to keep them safe"),
];

/// Run the wizard over `reader`/`writer`.  Returns `None` on EOF, leaving
/// the stored profile untouched.
pub fn run_wizard<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    current: Option<&PersonalRecord>,
) -> Option<PersonalRecord> {
    writeln!(writer, "\n{}", "Personal Profile Setup".bold().underline()).ok();
    writeln!(
        writer,
        "  Press Enter to keep the value in brackets, or type {} to clear it.\n",
        "-".bold()
    )
    .ok();

    let mut answers = Vec::with_capacity(SETUP_FIELDS.len());
    for (field, question) in SETUP_FIELDS {
        let existing = current
            .and_then(|r| r.get(field))
            .map(FieldValue::to_string)
            .unwrap_or_default();
        if existing.is_empty() {
            write!(writer, "  {}: ", question.bold()).ok();
        } else {
            write!(writer, "  {} [{}]: ", question.bold(), existing.dimmed()).ok();
        }
        writer.flush().ok();

        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => return None,
            Ok(_) => answers.push(resolve_answer(line.trim(), &existing)),
        }
    }
    Some(build_personal(current, &answers))
}

fn resolve_answer(typed: &str, existing: &str) -> String {
    match typed {
        "" => existing.to_string(),
        "-" => String::new(),
        other => other.to_string(),
    }
}

/// Combine wizard answers with any extra columns already in `current`.
/// Wizard fields come first, in form order.
pub fn build_personal(current: Option<&PersonalRecord>, answers: &[String]) -> PersonalRecord {
    let mut record = PersonalRecord::new();
    for ((field, _), answer) in SETUP_FIELDS.iter().zip(answers) {
        record.push(*field, answer.as_str());
    }
    if let Some(current) = current {
        for (name, value) in current.iter() {
            if !SETUP_FIELDS.iter().any(|(field, _)| *field == name) {
                record.push(name, value.clone());
            }
        }
    }
    record
}
