//! Helpers over `hickory_proto::op::Message` shared by the whole pipeline:
//! reply construction, canonical names, TTL arithmetic, EDNS0 option editing
//! and request padding.

pub mod edns;
pub mod name;
pub mod padding;
pub mod ttl;

use hickory_proto::op::{Message, MessageType, ResponseCode};

/// Builds an empty reply to `query`: same identifier, opcode, RD flag and
/// question section, NOERROR, no answers.
pub fn reply_to(query: &Message) -> Message {
    let mut reply = Message::new();
    reply.set_id(query.id());
    reply.set_message_type(MessageType::Response);
    reply.set_op_code(query.op_code());
    reply.set_recursion_desired(query.recursion_desired());
    reply.set_response_code(ResponseCode::NoError);
    for question in query.queries() {
        reply.add_query(question.clone());
    }
    reply
}

/// Stamps a server reply with the client's identifier and, when the server
/// elided the question section, copies it back from the query.
pub fn stamp_reply(response: &mut Message, query: &Message) {
    response.set_id(query.id());
    response.set_message_type(MessageType::Response);
    if response.queries().is_empty() {
        for question in query.queries() {
            response.add_query(question.clone());
        }
    }
}

/// Standardized failure reply for a query that could not be resolved.
pub fn server_failure(query: &Message) -> Message {
    let mut reply = reply_to(query);
    reply.set_response_code(ResponseCode::ServFail);
    reply
}
