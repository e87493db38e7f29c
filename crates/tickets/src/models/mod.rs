//! Domain models for ticket export

mod cursor_state;
mod event;
mod ticket;

pub use cursor_state::CursorState;
pub use event::{FieldMetadata, TICKET_EVENT_TYPE, TicketEvent};
pub use ticket::{Page, TicketId, TicketRecord, TicketStatus, Watermark};
