pub mod json_framed;
