mod interpreter;
mod packet_codec;
mod request_sender;
mod response;

pub use self::interpreter::{
    DefaultInterpreter, FILL_REQUEST_GUARD, FillStoreInterpreter, Interpretation,
    ResponseInterpreter, Verdict,
};
pub use self::packet_codec::{
    CodecError, Packet, PacketCodec, Request, RequestField, RequestIntent,
};
pub use self::request_sender::RequestSender;
pub use self::response::{DeviceStatus, ExpectedTemplate, Response};
