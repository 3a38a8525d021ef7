//! The hotel's built-in flows.

use crate::flow::{BranchRule, FlowAction, FlowDefinition, FlowStep, Validator};

pub const ROOM_BOOKING: &str = "room_booking";
pub const SPA_BOOKING: &str = "spa_booking";
pub const ROOM_SERVICE: &str = "room_service";
pub const COMPLAINT_ESCALATION: &str = "complaint_escalation";

pub fn hospitality_flows() -> Vec<FlowDefinition> {
    vec![room_booking(), spa_booking(), room_service(), complaint_escalation()]
}

fn room_booking() -> FlowDefinition {
    FlowDefinition::new(ROOM_BOOKING, "Room booking")
        .with_description("Reserve a room, with an upgrade offer for standard rooms")
        .triggered_by(&["BookRoom"])
        .with_steps(vec![
            FlowStep::input(
                "room_selection",
                "Which room would you like to book? Please enter the room ID (for example dlx-201).",
            )
            .validator(Validator::RoomAvailable)
            .branch(BranchRule::Keyword {
                step: "room_selection_type".into(),
                keywords: vec!["standard".into()],
                then: "upgrade_offer".into(),
                otherwise: "check_in_date".into(),
            }),
            FlowStep::confirmation(
                "upgrade_offer",
                "Good choice. For a little more you could have a deluxe room or suite with a better view. Would you like to upgrade? (yes/no)",
            )
            .branch(BranchRule::Affirmative {
                step: "upgrade_offer".into(),
                yes: "upgrade_selection".into(),
                no: "check_in_date".into(),
            }),
            FlowStep::input(
                "upgrade_selection",
                "Please enter the ID of the room you'd like instead (for example ste-301).",
            )
            .validator(Validator::RoomAvailable)
            .goto("check_in_date"),
            FlowStep::input(
                "check_in_date",
                "What date would you like to check in? (for example 12/24 or tomorrow)",
            )
            .validator(Validator::Date),
            FlowStep::input("nights", "How many nights will you be staying?")
                .validator(Validator::Number { min: 1, max: 30 }),
            FlowStep::input("guest_count", "How many guests will be staying?")
                .validator(Validator::GuestCount { min: 1, max: 6 }),
            FlowStep::input("guest_name", "May I have the name for the reservation?")
                .validator(Validator::MinLength { min: 2 }),
            FlowStep::input(
                "email",
                "What email address should we send the confirmation to?",
            )
            .validator(Validator::Email),
            FlowStep::confirmation(
                "confirm",
                "Please confirm: {guest_name}, checking in {check_in_date} for {nights} night(s), {guest_count} guest(s). Shall I complete the booking? (yes/no)",
            )
            .branch(BranchRule::Affirmative {
                step: "confirm".into(),
                yes: "payment".into(),
                no: "booking_declined".into(),
            }),
            FlowStep::action(
                "payment",
                "Payment processed (reference {payment}).",
                FlowAction::ProcessPayment,
            )
            .goto("booking_complete"),
            FlowStep::display(
                "booking_complete",
                "Your booking is confirmed! We've sent the details to {email}.",
            )
            .finish(),
            FlowStep::display(
                "booking_declined",
                "No problem, nothing has been booked. Let me know if you'd like to look at other rooms.",
            )
            .finish(),
        ])
}

fn spa_booking() -> FlowDefinition {
    FlowDefinition::new(SPA_BOOKING, "Spa booking")
        .with_description("Book a spa treatment")
        .triggered_by(&["BookSpa"])
        .with_steps(vec![
            FlowStep::input(
                "service",
                "Which treatment would you like? We offer Swedish Massage, Hot Stone Massage and Signature Facial.",
            )
            .validator(Validator::SpaService),
            FlowStep::input("date", "What day would you like to come in?").validator(Validator::Date),
            FlowStep::input("time", "What time suits you? (for example 2:30 pm)")
                .validator(Validator::Time),
            FlowStep::input("guest_name", "May I have your name?")
                .validator(Validator::MinLength { min: 2 }),
            FlowStep::confirmation(
                "confirm",
                "{service} on {date} at {time} for {guest_name}. Shall I book it? (yes/no)",
            )
            .branch(BranchRule::Affirmative {
                step: "confirm".into(),
                yes: "book_spa".into(),
                no: "spa_cancelled".into(),
            }),
            FlowStep::action(
                "book_spa",
                "Your {service} is booked (reference {book_spa}).",
                FlowAction::ScheduleSpa,
            ),
            FlowStep::display(
                "spa_complete",
                "Please arrive 10 minutes early. We look forward to seeing you at the spa!",
            )
            .finish(),
            FlowStep::display(
                "spa_cancelled",
                "No problem, I haven't booked anything.",
            )
            .finish(),
        ])
}

fn room_service() -> FlowDefinition {
    FlowDefinition::new(ROOM_SERVICE, "Room service")
        .with_description("Order food and drinks to a room")
        .triggered_by(&["PlaceOrder"])
        .with_steps(vec![
            FlowStep::input("room_number", "What is your room number?")
                .validator(Validator::RoomNumber),
            FlowStep::input(
                "menu_item",
                "What would you like to order? You can name any item from our menu.",
            )
            .validator(Validator::MenuItem),
            FlowStep::input("quantity", "How many would you like?")
                .validator(Validator::Number { min: 1, max: 10 }),
            FlowStep::input(
                "special_requests",
                "Any special requests? (say \"none\" if not)",
            ),
            FlowStep::confirmation(
                "confirm",
                "{quantity} x {menu_item} to room {room_number}. Shall I place the order? (yes/no)",
            )
            .branch(BranchRule::Affirmative {
                step: "confirm".into(),
                yes: "place_order".into(),
                no: "order_cancelled".into(),
            }),
            FlowStep::action(
                "place_order",
                "Your order has been placed (reference {place_order}). Estimated delivery is 30 to 45 minutes.",
                FlowAction::PlaceOrder,
            ),
            FlowStep::display("order_complete", "Enjoy your meal!").finish(),
            FlowStep::display("order_cancelled", "No problem, the order has been cancelled.")
                .finish(),
        ])
}

fn complaint_escalation() -> FlowDefinition {
    FlowDefinition::new(COMPLAINT_ESCALATION, "Complaint escalation")
        .with_description("Log a complaint and route it to the right team")
        .triggered_by(&["FileComplaint"])
        .with_steps(vec![
            FlowStep::input(
                "issue_description",
                "I'm sorry to hear that. Could you describe the issue?",
            )
            .validator(Validator::MinLength { min: 10 })
            .error_message("Please tell us a little more so we can help (at least 10 characters).")
            .branch(BranchRule::Keyword {
                step: "issue_description".into(),
                keywords: [
                    "broken",
                    "leak",
                    "not working",
                    "heating",
                    "air conditioning",
                    "plumbing",
                    "light",
                    "shower",
                    "toilet",
                ]
                .iter()
                .map(|k| k.to_string())
                .collect(),
                then: "maintenance_details".into(),
                otherwise: "general_details".into(),
            }),
            FlowStep::input(
                "maintenance_details",
                "I'll get maintenance on it. Which room is affected?",
            )
            .validator(Validator::RoomNumber)
            .goto("urgency"),
            FlowStep::input(
                "general_details",
                "Where did this happen, and is there anything else we should know?",
            )
            .validator(Validator::MinLength { min: 3 })
            .goto("urgency"),
            FlowStep::choice(
                "urgency",
                "How urgent is this? (low, medium, high)",
                &["low", "medium", "high"],
            ),
            FlowStep::input(
                "contact",
                "How can we reach you? Please share an email address or phone number.",
            )
            .validator(Validator::Contact),
            FlowStep::action(
                "create_ticket",
                "I've logged ticket {create_ticket}. Our team will contact you at {contact} shortly.",
                FlowAction::CreateTicket,
            ),
            FlowStep::display(
                "escalation_complete",
                "Thank you for your patience. We'll make this right.",
            )
            .finish(),
        ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::StepKind;

    #[test]
    fn all_builtin_flows_are_valid() {
        for flow in hospitality_flows() {
            flow.validate().unwrap_or_else(|e| panic!("{}: {e}", flow.id));
            assert!(!flow.trigger_intents.is_empty());
        }
    }

    #[test]
    fn no_flow_starts_with_an_auto_step() {
        for flow in hospitality_flows() {
            assert!(!flow.steps[0].kind.auto_advances(), "{}", flow.id);
        }
    }

    #[test]
    fn every_action_step_has_an_action() {
        for flow in hospitality_flows() {
            for step in flow.steps.iter().filter(|s| s.kind == StepKind::Action) {
                assert!(step.action.is_some(), "{}/{}", flow.id, step.id);
            }
        }
    }
}
