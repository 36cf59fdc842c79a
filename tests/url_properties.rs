// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Property: `parse(serialize(u)) == u` for any URL built through the
//! model's own setters (invariant 1).

use ipld_url_resolve::codec::{cid_for_bytes, Codec};
use ipld_url_resolve::url::{IpldUrl, Segment};
use quickcheck::Arbitrary;
use quickcheck_macros::quickcheck;

#[derive(Debug, Clone)]
struct ArbitraryUrl(IpldUrl);

impl Arbitrary for ArbitraryUrl {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        let seed: Vec<u8> = (0..8).map(|_| u8::arbitrary(g)).collect();
        let cid = cid_for_bytes(Codec::DagCbor, &seed);
        let mut url = IpldUrl::new(cid);

        let segment_count = usize::arbitrary(g) % 4;
        for i in 0..segment_count {
            let name = format!("seg{i}{}", char::arbitrary(g));
            let mut segment = Segment::new(name);
            if bool::arbitrary(g) {
                segment.parameters.set("k", format!("v{}", u8::arbitrary(g)));
            }
            url.push_segment(segment);
        }
        url.set_resolve_final(bool::arbitrary(g) && !url.segments().is_empty());

        if bool::arbitrary(g) {
            url.parameters_mut().set("schema", "s");
        }

        ArbitraryUrl(url)
    }
}

#[quickcheck]
fn parse_of_serialize_is_identity(url: ArbitraryUrl) -> bool {
    let serialized = url.0.to_string();
    match IpldUrl::parse(&serialized) {
        Ok(parsed) => parsed == url.0,
        Err(_) => false,
    }
}
