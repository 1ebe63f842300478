mod rate_proptest;
