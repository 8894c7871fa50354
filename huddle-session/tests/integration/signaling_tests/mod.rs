mod test_signal_buffering;
