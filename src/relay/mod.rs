pub mod packet;
pub mod zone_relay;
