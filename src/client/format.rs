//! Output formatting for CLI client commands.

use crate::adapter::ShowResult;

/// Print the acknowledgement of a lifecycle request.
pub fn print_ack(plugin: &str, action: &str) {
    println!("{plugin}: {action} ok");
}

/// Print the outcome of a show request.
pub fn print_show_result(placement_id: &str, result: &ShowResult) {
    println!("{}", describe(placement_id, result));
}

fn describe(placement_id: &str, result: &ShowResult) -> String {
    match result.error_reason() {
        None => format!("{placement_id}: ad shown"),
        Some(reason) => format!("{placement_id}: no ad shown ({})", reason.as_str()),
    }
}
