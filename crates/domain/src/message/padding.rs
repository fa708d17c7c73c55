/// Characters that never require percent-encoding in a URL (RFC 3986
/// unreserved set).
const URL_SAFE: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-._~";

/// Smallest padding that brings `pre_allocated` up to `least + k * gain`.
pub fn padding_length(pre_allocated: usize, least: usize, gain: usize) -> usize {
    let mut desired = least;
    while desired < pre_allocated {
        desired += gain;
    }
    desired - pre_allocated
}

/// Random URL-safe string of length `n`, used for the `random_padding`
/// query parameter.
pub fn url_safe_token(n: usize) -> String {
    (0..n)
        .map(|_| URL_SAFE[fastrand::usize(..URL_SAFE.len())] as char)
        .collect()
}
