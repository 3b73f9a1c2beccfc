// Shorthand for return Err(RiffError::new(ErrorKind::Foo))
//
// Usage:
// - err!(Variant)          -> return Err(RiffError::new(ErrorKind::Variant))
// - err!(Variant(Message)) -> return Err(RiffError::new(ErrorKind::Variant(Message)))
macro_rules! err {
	($variant:ident) => {
		return Err(crate::error::RiffError::new(
			crate::error::ErrorKind::$variant,
		))
	};
	($variant:ident($reason:expr)) => {
		return Err(crate::error::RiffError::new(
			crate::error::ErrorKind::$variant($reason),
		))
	};
}

// Shorthand for ErrorKind::FileDecoding("Message")
//
// Usage:
//
// - decode_err!(Message)
//
// or bail:
//
// - decode_err!(@BAIL Message)
macro_rules! decode_err {
	($reason:literal) => {
		crate::error::RiffError::new(crate::error::ErrorKind::FileDecoding($reason))
	};
	(@BAIL $reason:literal) => {
		return Err(decode_err!($reason))
	};
}

// Same as decode_err!, for ErrorKind::FileEncoding
macro_rules! encode_err {
	($reason:literal) => {
		crate::error::RiffError::new(crate::error::ErrorKind::FileEncoding($reason))
	};
	(@BAIL $reason:literal) => {
		return Err(encode_err!($reason))
	};
}

pub(crate) use {decode_err, encode_err, err};
