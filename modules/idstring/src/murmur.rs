//! MurmurHash64A with a zero seed, as used by the engine for id strings.

use crate::Hash64;

const M: u64 = 0xc6a4_a793_5bd1_e995;
const R: u32 = 47;

/// Hash a byte sequence the way the engine hashes resource and profiler names.
///
/// Input is consumed in 8-byte little-endian words; the 0-7 trailing bytes are
/// folded in individually, highest position first.
pub fn hash64(key: &[u8]) -> Hash64 {
    let mut h = (key.len() as u64).wrapping_mul(M);

    let mut blocks = key.chunks_exact(8);
    for block in &mut blocks {
        let mut word = [0u8; 8];
        word.copy_from_slice(block);
        let mut k = u64::from_le_bytes(word).wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);

        h ^= k;
        h = h.wrapping_mul(M);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        for (j, &b) in tail.iter().enumerate().rev() {
            h ^= u64::from(b) << (8 * j);
        }
        h = h.wrapping_mul(M);
    }

    h ^= h >> R;
    h = h.wrapping_mul(M);
    h ^= h >> R;
    Hash64(h)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = "I was reading about iq article on ray differentials and I remembered this... http://research.microsoft.com/en-us/projects/symbolic_differentiation_in_hlsl/ ... do anyone use that at all? glsl doesn't have it afaik.";

    // hash64(INPUT[..i]) for i in 1..=INPUT.len()
    const PREFIX_HASHES: [u64; 214] = [
        0x81c48d4812b121fd, 0x9f85c7c629431961, 0x07f5da41d9a3c25d, 0x13780a51ae0f509d,
        0xf157ebafc48f21a6, 0x286013f37514203b, 0x287178df4571dbb4, 0xf15f6afbf36590fa,
        0x5b58344230cfdf36, 0x12ef32bb35328dfe, 0x67cdc22ead6d1f53, 0xa251a54a8d0c4c1a,
        0x7a1c3680cd8eeb92, 0x775febe29fd5655f, 0x2e4b8041b55c0b29, 0xe605ee6c424a0311,
        0x7cf7d490744738c1, 0x937afade1786427b, 0x372a771f989ff62e, 0xcedbf19c4a805661,
        0xd5080aabd8779586, 0xe28ea1f726bada70, 0x26bc8546286349a8, 0x4f3c11f9c9018b58,
        0x23cd63abe4043863, 0x023406863ce1e8f2, 0xf3b2492d1c3853c8, 0x2393c25de5c10d00,
        0x2b93e9c8b5449fd9, 0xca3578d625661b2b, 0x1f29ab0af156ab4c, 0x506ff3d1efa9dbd1,
        0x863119d6197deec7, 0xf10b3eb44a3e51ef, 0x57ec7c91874e1435, 0x892f204b217c5d48,
        0x0edf2f2c55e261a7, 0x40762b3d001462bd, 0x5b21d461bf099758, 0xa4e00dfdb3549b76,
        0xb5df989c13f07105, 0xaccf500aa668962a, 0x9edfb1a4d661cfdd, 0xaf92ee3b558c896c,
        0xe982aaf52f911304, 0x9c29ebfddc189bea, 0xd2ccd71c6c40b665, 0xd11bacff0bb2e572,
        0x2bf4ce81d0140f4e, 0x0ac8390abb2e686e, 0xf83107c1e9018264, 0x2daef68a9bbd55b7,
        0x460a4b6c4f44239a, 0x36642c55c9e40573, 0xf3d329d3b11068bd, 0x3a82c3dd22234089,
        0xb5c671aba80c53c4, 0xc614b8af63c6ddd1, 0x4c208b9329b7d50a, 0xf059b7a3d1379928,
        0xdcd8ed709afb8113, 0xc33abdf95b892f65, 0xc228040f3ec3e0c3, 0x8519aa3cf0625424,
        0x64f98fadfa3535fa, 0xb61d104bd48bda96, 0xcad3d8e254b52787, 0x2ab8651fd72015c7,
        0x01bc4a54f0b505b4, 0xf1f80c208dd86cf9, 0x5cfcc4a72bca4466, 0xa5580acdf56a7edf,
        0x3cc4ea1779bdab5e, 0xb5665ab92ad68335, 0x90a694c209fd2119, 0x80342885f10ae3b5,
        0xe4b0403dab49de10, 0xefccc0e3297bba2a, 0x4f4a0b6aa90218fd, 0x93d0397023222409,
        0x74f9f9436b22ea54, 0xf5bd3676f62df1db, 0x64e72cc3c27f3dad, 0xa59c868c194b5d84,
        0xb3463816feb61f14, 0xa484c4f73855b42c, 0xa0da1fb3125b122c, 0xb42f6db92d104788,
        0x68ce09535a3804ee, 0xf53dad899c70b3e0, 0x4828ad597f1febb8, 0x1c8ff6f37cf23dce,
        0x77ce42588e605408, 0xce9ffa94e35a2e32, 0x822a903bee78f43b, 0xfa3c4f769254d95d,
        0xe74b3a875da2f4c9, 0x55e875dc9efa3eb5, 0xbb47678209495f4f, 0x4d8dbb0962326ba1,
        0x6758615516a25372, 0xbc05d0691d9c377a, 0x9c0223d0b95dca05, 0x970db0797123fc96,
        0x9c87af8b6cc85c7c, 0x878110950401ff5a, 0x22d2423595d05499, 0x16d7adc3bd9873e2,
        0x85997e39a8a887ff, 0x747fbaa8f0f8ab75, 0xea3060f995f21268, 0x314f4b4750f06569,
        0xe1064261891515e5, 0xfa59ae6dff9d72a1, 0x956d147a3d2e8a6a, 0x33d38c4d98a51597,
        0xe89d922e72a7b50e, 0x8af1ef1b2e97fb82, 0xc4985fefa2b0e86e, 0xb868c94d2c3a22a3,
        0xd167d35d98d6176e, 0xcb023553daeb448c, 0xb1d867f7202a665d, 0xd9556538835b9999,
        0x79dc048f7d758dbd, 0xfd418d26424a3e84, 0x65036a7c4513d8b7, 0x3b84e58748cb423c,
        0x99a4ae0bff4610f7, 0x5e86f326919c1f50, 0xcca4c0a05695d05f, 0x5b94252ad6200656,
        0x3c71e040487f29a9, 0x070f7916f4e21331, 0x87a24b685349d862, 0x2af136dda0999654,
        0x7e7cdcb1313a1874, 0xf0d79cf4b05d8b32, 0x44b54b2716b6d2c9, 0xe08977475d5e0607,
        0xf929016d3014f967, 0xaf015a16faf558ff, 0x57801bbc56021060, 0x6baa2f6f6c7fe0a2,
        0x4e2da6dc5eb3d987, 0xddfabdf9022c0b5e, 0x49f8b5d5d8ea30a8, 0xe844f64ebca366f8,
        0x4920e98c563d5f3c, 0xb80cb9df40768272, 0xf3cf68e8b2902486, 0x4030b7edd9d7f4c0,
        0x99fec3f5c197feb9, 0x18e6ffd9ba6f2b31, 0x8bc2ddb19ffd5333, 0xda253c35ee9da24c,
        0xa5b16489c7a56cd4, 0xea9b3c78e4f67c11, 0xfa7afd2e1591e248, 0x134efc164aaf2faa,
        0xfdd2b46ef4f45f54, 0x53b401710194c726, 0x0130ea1d23e7d887, 0x739003ccd7e74e23,
        0x19a973a0d78e0f1e, 0x83143c0d097fd0fc, 0x0fd2e6b10a3d758d, 0x21e7e76d373fc4f9,
        0x7370fde93a1008b9, 0xae9a4ba2bf4aee93, 0x433667208c7195bc, 0x2738b388830910d7,
        0xbf27ef5f00fb6c6c, 0x0ce48ab089456c5c, 0x61a3d414c36ba42a, 0x4d8f609eb21a9a54,
        0x37dfa1f356ecfcec, 0x34f3613ca3b8ccf3, 0xacba0ee9895065e7, 0xf0b64c18fbe07421,
        0x3b5caa4bfcfc717d, 0x3337bf42d77d0146, 0xc469991c0d3aecd0, 0xabf1aaf7db74c0ae,
        0x588325e5445c5b72, 0x62eedbd861fdcc65, 0xb46c59ae9b215c88, 0x0cfe76389624f557,
        0xc508d32961fbcd89, 0xe8005626774b5665, 0xb87f423bd35bc991, 0xadaa2bbd60d11d5e,
        0x69b7a9c1cb44b082, 0x4f9c5b35e3a54eba, 0x6082bd14f2123f04, 0xa9ff75fb2ffae70f,
        0xc6ca76a406a7ac16, 0xdf8da6267fe3fb23, 0x34d18a9ac40091c7, 0xd9e9282b7d8b45fe,
        0xb4ebb4505103e256, 0x7fbecae1ff09302b, 0xea155631829d543d, 0x5cc62924c92b467c,
        0xd4813862b9f63ca5, 0xed14b2a25c82cf5f, 0x01621212b9c72040, 0xc24e5d07febe6461,
        0x577cef2e3c19125c, 0x5176b6b90f41a833, 0xf825abb845ad49cc, 0xd593ca45e39d4721,
        0xfbf8e35c0eda6ee7, 0xaf9c43cead510441,
    ];

    #[test]
    fn empty_input_hashes_to_zero() {
        assert_eq!(hash64(b""), Hash64(0));
    }

    #[test]
    fn known_resource_name() {
        assert_eq!(hash64(b"unit"), Hash64(0xe0a4_8d0b_e9a7_453f));
    }

    #[test]
    fn deterministic() {
        assert_eq!(hash64(b"core/units/camera"), hash64(b"core/units/camera"));
        assert_ne!(hash64(b"a"), hash64(b"b"));
    }

    #[test]
    fn prefixes_match_reference() {
        let bytes = INPUT.as_bytes();
        assert_eq!(bytes.len(), PREFIX_HASHES.len());
        for (i, expected) in PREFIX_HASHES.iter().enumerate() {
            let got = hash64(&bytes[..=i]);
            assert_eq!(got, Hash64(*expected), "prefix of length {} (tail {})", i + 1, (i + 1) % 8);
        }
    }
}
