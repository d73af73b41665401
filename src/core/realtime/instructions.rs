//! System instructions for the calling assistant.

use std::fmt::Write;

use tracing::warn;

use crate::calls::CallMetadata;
use crate::utils::availability::{format_availability, remaining_slots, soonest_slot};

/// Build the assistant persona and task for one call.
pub fn build_instructions(call: &CallMetadata) -> String {
    let mut text = String::new();

    let _ = writeln!(
        text,
        "You are a friendly scheduling assistant calling {first_name} on behalf of {company} \
         ({description}).",
        first_name = call.first_name,
        company = call.company,
        description = call.company_description,
    );
    let _ = writeln!(
        text,
        "The reason for the call is the reported issue: {}. Confirm the issue briefly \
         and help {} book a visit.",
        call.issue, call.first_name
    );
    let _ = writeln!(
        text,
        "Speak in the language with code '{}'. Keep your answers short and \
         conversational; this is a phone call.",
        call.language
    );

    text.push('\n');
    text.push_str(&availability_section(call));

    text.push_str(
        "\nOnce an appointment is agreed, or the customer declines, say goodbye and \
         use the end_call tool. Do not call scheduled_appointment or write_call_summary \
         during the conversation; you will be asked to after the call.",
    );
    text
}

fn availability_section(call: &CallMetadata) -> String {
    let days = match format_availability(&call.availability) {
        Ok(days) => days,
        Err(e) => {
            warn!(call_id = %call.call_id, "Using raw availability: {}", e);
            return format!(
                "Available appointment slots (24-hour times): {}\n",
                call.availability
                    .iter()
                    .map(|day| format!("{} {}", day.date, day.slots.join(", ")))
                    .collect::<Vec<_>>()
                    .join("; ")
            );
        }
    };

    let Some(soonest) = soonest_slot(&days) else {
        return "There are no appointments available right now. Apologize and offer \
                to have someone call back.\n"
            .to_string();
    };

    let mut section = format!("Offer the soonest available appointment first: {soonest}.\n");
    let rest = remaining_slots(&days);
    if !rest.is_empty() {
        section.push_str("If that does not work, these times are also available:\n");
        for day in rest {
            let _ = writeln!(section, "- {} ({}): {}", day.day, day.date, day.slots.join(", "));
        }
    }
    section
}
