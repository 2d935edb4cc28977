use anyhow::Result;
use makerspace_core::{Actor, Calendar, EventId, Recurrence};
use owo_colors::OwoColorize;

pub async fn run(calendar: &Calendar, actor: &Actor, id: &EventId) -> Result<()> {
    // Raw row: broken events must stay deletable.
    let row = calendar.events().get_row(id).await?;
    calendar.delete(actor, id).await?;

    let field = |key: &str| row.get(key).and_then(|v| v.as_str()).unwrap_or_default();
    let title = match field("title") {
        "" => id.as_str(),
        title => title,
    };

    let mut message = format!("  Deleted: {}", title);
    if field("recurrence").parse::<Recurrence>().is_ok_and(|r| r.is_recurring()) {
        message.push_str(" (all occurrences)");
    }
    println!("{}", message.red());
    Ok(())
}
